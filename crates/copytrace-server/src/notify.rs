//! Terminal-outcome notifications.
//!
//! One row per finished run, success or failure, addressed to the analysis
//! owner. Notifications are strictly best-effort: a run's outcome is already
//! durable in the `analyses` row, so a failed insert here is logged and
//! dropped instead of disturbing the run's terminal state.

use copytrace_core::{Analysis, NotificationRecord, RecordStore};

pub async fn analysis_done(records: &dyn RecordStore, analysis: &Analysis, score: f64) {
    let Some(user_id) = analysis.user_id.clone() else {
        return;
    };
    let rec = NotificationRecord {
        user_id,
        title: "Analysis complete".to_string(),
        message: format!(
            "\"{}\" finished with a similarity score of {score:.1}%.",
            analysis.display_name()
        ),
        read: false,
    };
    if let Err(e) = records.insert_notification(&rec).await {
        tracing::warn!(analysis = %analysis.id, error = %e, "completion notification dropped");
    }
}

pub async fn analysis_failed(records: &dyn RecordStore, analysis: &Analysis) {
    let Some(user_id) = analysis.user_id.clone() else {
        return;
    };
    let rec = NotificationRecord {
        user_id,
        title: "Analysis failed".to_string(),
        message: format!(
            "We could not finish analyzing \"{}\". Please submit it again.",
            analysis.display_name()
        ),
        read: false,
    };
    if let Err(e) = records.insert_notification(&rec).await {
        tracing::warn!(analysis = %analysis.id, error = %e, "failure notification dropped");
    }
}
