use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::db::operations as ops;
use crate::engine::{self, RequirementGraph};
use crate::services::course_status::CourseStatusService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub students: usize,
    pub transitions: usize,
    pub failures: usize,
}

/// Recomputes every student with progress rows. A failing student is logged
/// and skipped; the next sweep retries it.
pub async fn run_recompute_sweep(
    service: Arc<CourseStatusService>,
) -> Result<SweepStats, super::WorkerError> {
    let start = Instant::now();
    debug!("Starting recompute sweep");

    let students = {
        let mut conn = service.pool().acquire().await?;

        let graph = RequirementGraph::from_edges(ops::get_all_prerequisites(&mut conn).await?);
        if let Some(cycle) = engine::find_prerequisite_cycle(&graph) {
            let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            warn!(
                cycle = %path.join(" -> "),
                "Prerequisite cycle detected; courses on it can never unlock"
            );
        }

        ops::list_students_with_progress(&mut conn).await?
    };

    let mut stats = SweepStats::default();
    for student_id in students {
        stats.students += 1;
        match service.recompute_all(student_id).await {
            Ok(transitions) => stats.transitions += transitions.len(),
            Err(err) => {
                stats.failures += 1;
                error!(student_id = %student_id, error = %err, "Recompute failed for student");
            }
        }
    }

    info!(
        students = stats.students,
        transitions = stats.transitions,
        failures = stats.failures,
        duration_secs = format!("{:.2}", start.elapsed().as_secs_f64()),
        "Recompute sweep completed"
    );

    Ok(stats)
}
