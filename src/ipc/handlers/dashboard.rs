use crate::config::ProgressSettings;
use crate::ipc::error::{from_error, ok};
use crate::ipc::handlers::stats::reconcile_options;
use crate::ipc::helpers::{db_conn, optional_subject, target_student};
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::reconcile;
use serde_json::{json, Value};

fn handle_dashboard_summary(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match target_student(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject = match optional_subject(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    if let Err(e) = ledger::ensure_student_exists(conn, &student_id) {
        return from_error(&req.id, &e);
    }
    let entries = match ledger::list_for_student(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let stats = reconcile::compute_student_statistics(
        &state.catalog,
        &student_id,
        &entries,
        subject,
        reconcile_options(conn),
    );
    let reading = match ledger::reading_summary(conn, &student_id) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let limit = ProgressSettings::load(conn).recent_activity_limit.max(1) as usize;
    let recent = match ledger::recent_completions(conn, &student_id, subject, limit) {
        Ok(v) => v,
        Err(e) => return from_error(&req.id, &e),
    };
    let recent: Vec<Value> = recent
        .iter()
        .map(|e| {
            let lesson = state.catalog.get_lesson(e.key()).ok();
            json!({
                "subject": e.subject,
                "seq": e.seq,
                "title": lesson.map(|l| l.title.clone()),
                "orphaned": lesson.is_none(),
                "completedAt": e.completed_at,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "subject": subject,
            "lessonsCompleted": stats.lessons_completed,
            "lessonsTotal": stats.lessons_total,
            "lessonsPercentage": reconcile::percentage(stats.lessons_completed, stats.lessons_total),
            "overallPercentage": stats.overall.percentage,
            "booksLogged": reading.books_logged,
            "totalPagesRead": reading.total_pages_read,
            "averageRating": reading.average_rating,
            "orphanedCount": stats.orphaned_count,
            "recentActivity": recent,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.summary" => Some(handle_dashboard_summary(state, req)),
        _ => None,
    }
}
