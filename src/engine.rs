//! Course status propagation.
//!
//! Everything here is pure: callers load a slice of the requirement graph and
//! the student's current rows, ask for a decision, and persist the result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{
    Course, CourseId, CourseStatus, Requirement, StatusTransition, StudentCourseStatus, StudentId,
};

/// Indexed view over a set of requirement edges.
#[derive(Debug, Clone, Default)]
pub struct RequirementGraph {
    requires: HashMap<CourseId, Vec<Requirement>>,
    required_by: HashMap<CourseId, Vec<Requirement>>,
}

impl RequirementGraph {
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = Requirement>,
    {
        let mut graph = Self::default();
        for edge in edges {
            graph.insert(edge);
        }
        graph
    }

    pub fn insert(&mut self, edge: Requirement) {
        let outgoing = self.requires.entry(edge.course_id).or_default();
        if outgoing.contains(&edge) {
            return;
        }
        outgoing.push(edge);
        self.required_by
            .entry(edge.required_course_id)
            .or_default()
            .push(edge);
    }

    pub fn requirements_of(&self, course_id: CourseId) -> &[Requirement] {
        self.requires
            .get(&course_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn prerequisites_of(&self, course_id: CourseId) -> impl Iterator<Item = CourseId> + '_ {
        self.requirements_of(course_id)
            .iter()
            .filter(|edge| edge.is_prerequisite())
            .map(|edge| edge.required_course_id)
    }

    pub fn has_prerequisites(&self, course_id: CourseId) -> bool {
        self.prerequisites_of(course_id).next().is_some()
    }

    /// Courses that list `course_id` as a prerequisite, ascending and deduplicated.
    pub fn prerequisite_dependents_of(&self, course_id: CourseId) -> Vec<CourseId> {
        let dependents: BTreeSet<CourseId> = self
            .required_by
            .get(&course_id)
            .into_iter()
            .flatten()
            .filter(|edge| edge.is_prerequisite())
            .map(|edge| edge.course_id)
            .collect();
        dependents.into_iter().collect()
    }
}

/// One student's rows keyed by course.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    student_id: StudentId,
    rows: BTreeMap<CourseId, StudentCourseStatus>,
}

impl ProgressSnapshot {
    pub fn new(student_id: StudentId) -> Self {
        Self {
            student_id,
            rows: BTreeMap::new(),
        }
    }

    pub fn from_rows<I>(student_id: StudentId, rows: I) -> Self
    where
        I: IntoIterator<Item = StudentCourseStatus>,
    {
        let mut snapshot = Self::new(student_id);
        for row in rows {
            if row.student_id == student_id {
                snapshot.rows.insert(row.course_id, row);
            }
        }
        snapshot
    }

    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    pub fn status_of(&self, course_id: CourseId) -> Option<CourseStatus> {
        self.rows.get(&course_id).map(|row| row.status)
    }

    pub fn contains(&self, course_id: CourseId) -> bool {
        self.rows.contains_key(&course_id)
    }

    pub fn is_passed(&self, course_id: CourseId) -> bool {
        self.status_of(course_id) == Some(CourseStatus::Passed)
    }

    pub fn rows(&self) -> impl Iterator<Item = &StudentCourseStatus> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn upsert(&mut self, row: StudentCourseStatus) {
        self.rows.insert(row.course_id, row);
    }

    /// Applies transitions and returns the rows that changed, ready to persist.
    pub fn apply(&mut self, transitions: &[StatusTransition]) -> Vec<StudentCourseStatus> {
        let mut changed = Vec::with_capacity(transitions.len());
        for transition in transitions {
            if let Some(row) = self.rows.get_mut(&transition.course_id) {
                if row.status == transition.from {
                    row.status = transition.to;
                    changed.push(row.clone());
                }
            }
        }
        changed
    }
}

/// `Locked` when the course has at least one prerequisite, otherwise `Available`.
/// Corequisites never lock.
pub fn initial_status(graph: &RequirementGraph, course_id: CourseId) -> CourseStatus {
    if graph.has_prerequisites(course_id) {
        CourseStatus::Locked
    } else {
        CourseStatus::Available
    }
}

/// Every prerequisite of `course_id` is `Passed` for the student. A missing row
/// counts as not passed.
pub fn requirements_met(
    graph: &RequirementGraph,
    progress: &ProgressSnapshot,
    course_id: CourseId,
) -> bool {
    graph
        .prerequisites_of(course_id)
        .all(|required| progress.is_passed(required))
}

/// Rows to create for plan courses the student has no row for yet.
pub fn seed_rows(
    graph: &RequirementGraph,
    plan_courses: &[Course],
    progress: &ProgressSnapshot,
) -> Vec<StudentCourseStatus> {
    let mut seen = BTreeSet::new();
    plan_courses
        .iter()
        .filter(|course| !progress.contains(course.id))
        .filter(|course| seen.insert(course.id))
        .map(|course| StudentCourseStatus {
            student_id: progress.student_id(),
            course_id: course.id,
            status: initial_status(graph, course.id),
            attempt_count: 0,
        })
        .collect()
}

/// One-hop unlocks after `passed_course_id` reached `Passed`.
///
/// Only `Locked` dependents whose prerequisites are now all passed move to
/// `Available`; nothing else is touched.
pub fn unlocks_after_pass(
    graph: &RequirementGraph,
    progress: &ProgressSnapshot,
    passed_course_id: CourseId,
) -> Vec<StatusTransition> {
    graph
        .prerequisite_dependents_of(passed_course_id)
        .into_iter()
        .filter(|dependent| progress.status_of(*dependent) == Some(CourseStatus::Locked))
        .filter(|dependent| requirements_met(graph, progress, *dependent))
        .map(|course_id| StatusTransition {
            course_id,
            from: CourseStatus::Locked,
            to: CourseStatus::Available,
        })
        .collect()
}

/// Full reconciliation of `Locked`/`Available` rows against the graph.
///
/// The predicate only reads `Passed` rows and this never writes one, so a
/// single pass reaches the fixed point.
pub fn recompute(graph: &RequirementGraph, progress: &ProgressSnapshot) -> Vec<StatusTransition> {
    progress
        .rows()
        .filter(|row| row.status.is_automatic())
        .filter_map(|row| {
            let met = requirements_met(graph, progress, row.course_id);
            let target = match (row.status, met) {
                (CourseStatus::Locked, true) => CourseStatus::Available,
                (CourseStatus::Available, false) => CourseStatus::Locked,
                _ => return None,
            };
            Some(StatusTransition {
                course_id: row.course_id,
                from: row.status,
                to: target,
            })
        })
        .collect()
}

/// Returns one prerequisite cycle (first node repeated at the end) if any exists.
pub fn find_prerequisite_cycle(graph: &RequirementGraph) -> Option<Vec<CourseId>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Visiting,
        Done,
    }

    let mut nodes: Vec<CourseId> = graph.requires.keys().copied().collect();
    nodes.sort();

    let mut marks: HashMap<CourseId, Mark> = HashMap::new();

    for start in nodes {
        if marks.contains_key(&start) {
            continue;
        }

        // Iterative DFS; `path` mirrors the stack of nodes currently being visited.
        let mut stack: Vec<(CourseId, Vec<CourseId>, usize)> = Vec::new();
        let mut path: Vec<CourseId> = Vec::new();

        let mut children: Vec<CourseId> = graph.prerequisites_of(start).collect();
        children.sort();
        marks.insert(start, Mark::Visiting);
        path.push(start);
        stack.push((start, children, 0));

        while let Some((node, children, next)) = stack.last_mut() {
            if *next >= children.len() {
                marks.insert(*node, Mark::Done);
                path.pop();
                stack.pop();
                continue;
            }

            let child = children[*next];
            *next += 1;

            match marks.get(&child) {
                Some(Mark::Visiting) => {
                    let from = path.iter().position(|id| *id == child).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(child);
                    return Some(cycle);
                }
                Some(Mark::Done) => {}
                None => {
                    let mut grandchildren: Vec<CourseId> = graph.prerequisites_of(child).collect();
                    grandchildren.sort();
                    marks.insert(child, Mark::Visiting);
                    path.push(child);
                    stack.push((child, grandchildren, 0));
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PlanId;

    const STUDENT: StudentId = StudentId(7);

    fn course(id: i64) -> Course {
        Course {
            id: CourseId(id),
            study_plan_id: PlanId(1),
            code: format!("C{id}"),
            name: format!("Course {id}"),
            credits: 3,
        }
    }

    fn row(course_id: i64, status: CourseStatus) -> StudentCourseStatus {
        StudentCourseStatus {
            student_id: STUDENT,
            course_id: CourseId(course_id),
            status,
            attempt_count: 0,
        }
    }

    fn pre(course: i64, required: i64) -> Requirement {
        Requirement::prerequisite(CourseId(course), CourseId(required))
    }

    fn co(course: i64, required: i64) -> Requirement {
        Requirement::corequisite(CourseId(course), CourseId(required))
    }

    #[test]
    fn test_initial_status_ignores_corequisites() {
        let graph = RequirementGraph::from_edges([pre(2, 1), co(3, 1)]);
        assert_eq!(initial_status(&graph, CourseId(1)), CourseStatus::Available);
        assert_eq!(initial_status(&graph, CourseId(2)), CourseStatus::Locked);
        assert_eq!(initial_status(&graph, CourseId(3)), CourseStatus::Available);
    }

    #[test]
    fn test_seed_rows_skips_existing() {
        let graph = RequirementGraph::from_edges([pre(2, 1)]);
        let progress = ProgressSnapshot::from_rows(STUDENT, [row(2, CourseStatus::Available)]);
        let rows = seed_rows(&graph, &[course(1), course(2), course(1)], &progress);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course_id, CourseId(1));
        assert_eq!(rows[0].status, CourseStatus::Available);
        assert_eq!(rows[0].attempt_count, 0);
    }

    #[test]
    fn test_requirements_met_needs_every_prerequisite() {
        let graph = RequirementGraph::from_edges([pre(4, 1), pre(4, 2), co(4, 3)]);
        let partial = ProgressSnapshot::from_rows(
            STUDENT,
            [row(1, CourseStatus::Passed), row(2, CourseStatus::InProgress)],
        );
        assert!(!requirements_met(&graph, &partial, CourseId(4)));

        let full = ProgressSnapshot::from_rows(
            STUDENT,
            [row(1, CourseStatus::Passed), row(2, CourseStatus::Passed)],
        );
        assert!(requirements_met(&graph, &full, CourseId(4)));
    }

    #[test]
    fn test_requirements_met_missing_row_is_not_passed() {
        let graph = RequirementGraph::from_edges([pre(2, 1)]);
        let progress = ProgressSnapshot::new(STUDENT);
        assert!(!requirements_met(&graph, &progress, CourseId(2)));
        assert!(requirements_met(&graph, &progress, CourseId(1)));
    }

    #[test]
    fn test_unlocks_only_locked_dependents() {
        let graph = RequirementGraph::from_edges([pre(2, 1), pre(3, 1), pre(4, 1), co(5, 1)]);
        let progress = ProgressSnapshot::from_rows(
            STUDENT,
            [
                row(1, CourseStatus::Passed),
                row(2, CourseStatus::Locked),
                row(3, CourseStatus::InProgress),
                row(4, CourseStatus::Locked),
                row(5, CourseStatus::Locked),
            ],
        );

        let transitions = unlocks_after_pass(&graph, &progress, CourseId(1));
        let unlocked: Vec<CourseId> = transitions.iter().map(|t| t.course_id).collect();
        assert_eq!(unlocked, vec![CourseId(2), CourseId(4)]);
        assert!(transitions
            .iter()
            .all(|t| t.from == CourseStatus::Locked && t.to == CourseStatus::Available));
    }

    #[test]
    fn test_unlock_is_one_hop() {
        let graph = RequirementGraph::from_edges([pre(2, 1), pre(3, 2)]);
        let mut progress = ProgressSnapshot::from_rows(
            STUDENT,
            [
                row(1, CourseStatus::Passed),
                row(2, CourseStatus::Locked),
                row(3, CourseStatus::Locked),
            ],
        );

        let transitions = unlocks_after_pass(&graph, &progress, CourseId(1));
        progress.apply(&transitions);
        assert_eq!(progress.status_of(CourseId(2)), Some(CourseStatus::Available));
        assert_eq!(progress.status_of(CourseId(3)), Some(CourseStatus::Locked));

        assert!(unlocks_after_pass(&graph, &progress, CourseId(1)).is_empty());
    }

    #[test]
    fn test_recompute_demotes_and_promotes() {
        let graph = RequirementGraph::from_edges([pre(2, 1), pre(3, 1)]);
        let progress = ProgressSnapshot::from_rows(
            STUDENT,
            [
                row(1, CourseStatus::Available),
                row(2, CourseStatus::Available),
                row(3, CourseStatus::Passed),
            ],
        );
        let transitions = recompute(&graph, &progress);
        assert_eq!(
            transitions,
            vec![StatusTransition {
                course_id: CourseId(2),
                from: CourseStatus::Available,
                to: CourseStatus::Locked,
            }]
        );

        let passed = ProgressSnapshot::from_rows(
            STUDENT,
            [row(1, CourseStatus::Passed), row(2, CourseStatus::Locked)],
        );
        let transitions = recompute(&graph, &passed);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to, CourseStatus::Available);
    }

    #[test]
    fn test_recompute_reaches_fixed_point() {
        let graph = RequirementGraph::from_edges([pre(2, 1), pre(3, 2), pre(4, 3)]);
        let mut progress = ProgressSnapshot::from_rows(
            STUDENT,
            [
                row(1, CourseStatus::Passed),
                row(2, CourseStatus::Locked),
                row(3, CourseStatus::Available),
                row(4, CourseStatus::InProgress),
            ],
        );
        let first = recompute(&graph, &progress);
        assert_eq!(first.len(), 2);
        progress.apply(&first);
        assert!(recompute(&graph, &progress).is_empty());
        assert_eq!(progress.status_of(CourseId(4)), Some(CourseStatus::InProgress));
    }

    #[test]
    fn test_apply_ignores_stale_transitions() {
        let mut progress = ProgressSnapshot::from_rows(STUDENT, [row(1, CourseStatus::Passed)]);
        let changed = progress.apply(&[StatusTransition {
            course_id: CourseId(1),
            from: CourseStatus::Locked,
            to: CourseStatus::Available,
        }]);
        assert!(changed.is_empty());
        assert_eq!(progress.status_of(CourseId(1)), Some(CourseStatus::Passed));
    }

    #[test]
    fn test_graph_deduplicates_edges() {
        let graph = RequirementGraph::from_edges([pre(2, 1), pre(2, 1), co(2, 1)]);
        assert_eq!(graph.requirements_of(CourseId(2)).len(), 2);
        assert_eq!(graph.prerequisite_dependents_of(CourseId(1)), vec![CourseId(2)]);
    }

    #[test]
    fn test_find_prerequisite_cycle() {
        let acyclic = RequirementGraph::from_edges([pre(2, 1), pre(3, 2), pre(3, 1), co(1, 3)]);
        assert_eq!(find_prerequisite_cycle(&acyclic), None);

        let cyclic = RequirementGraph::from_edges([pre(2, 1), pre(3, 2), pre(1, 3)]);
        let cycle = find_prerequisite_cycle(&cyclic).expect("cycle");
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);

        let self_loop = RequirementGraph::from_edges([pre(5, 5)]);
        assert_eq!(
            find_prerequisite_cycle(&self_loop),
            Some(vec![CourseId(5), CourseId(5)])
        );
    }
}
