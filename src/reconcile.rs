//! Completion statistics derived from the catalog and the progress ledger.
//!
//! Nothing here touches the database: callers load entries and pass the
//! current `Catalog` by reference. Results are recomputed on every request.

use crate::catalog::Catalog;
use crate::curriculum::{Competency, Subject};
use crate::ledger::StudentProgressEntry;
use serde::Serialize;
use std::collections::HashSet;

/// `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Nearest whole percent, halves rounded up. `None` when there is nothing to
/// complete; the presentation layer shows that as "not applicable".
pub fn percentage(completed: usize, total: usize) -> Option<i64> {
    if total == 0 {
        return None;
    }
    Some(((completed * 100 + total / 2) / total) as i64)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Count completed orphaned entries in `rawCompletedCount`.
    pub count_orphans_in_raw: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetencyStatistic {
    pub subject: Subject,
    pub competency: Competency,
    pub label: &'static str,
    pub completed: usize,
    pub total: usize,
    pub percentage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRatio {
    pub completed: usize,
    pub total: usize,
    pub percentage: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatistics {
    pub student_id: String,
    pub subject: Option<Subject>,
    pub competencies: Vec<CompetencyStatistic>,
    /// Sum of competency numerators over sum of competency denominators.
    pub overall: CompletionRatio,
    /// Distinct current lessons completed / in scope.
    pub lessons_completed: usize,
    pub lessons_total: usize,
    pub orphaned_count: usize,
    pub raw_completed_count: usize,
}

impl StudentStatistics {
    pub fn competency(&self, c: Competency) -> Option<&CompetencyStatistic> {
        self.competencies.iter().find(|s| s.competency == c)
    }
}

pub fn compute_student_statistics(
    catalog: &Catalog,
    student_id: &str,
    entries: &[StudentProgressEntry],
    subject: Option<Subject>,
    opts: ReconcileOptions,
) -> StudentStatistics {
    let in_scope = |s: Subject| subject.map(|f| f == s).unwrap_or(true);

    let mut completed_keys = HashSet::new();
    let mut orphaned_count = 0usize;
    let mut orphaned_completed = 0usize;
    for e in entries.iter().filter(|e| in_scope(e.subject)) {
        let key = e.key();
        if !catalog.contains(key) {
            orphaned_count += 1;
            if e.completed {
                orphaned_completed += 1;
            }
            continue;
        }
        if e.completed {
            completed_keys.insert(key);
        }
    }

    let mut competencies = Vec::new();
    for s in Subject::selected(subject) {
        for &c in s.competencies() {
            let mut total = 0usize;
            let mut completed = 0usize;
            for l in catalog
                .lessons_for(Some(s))
                .filter(|l| l.competencies.contains(&c))
            {
                total += 1;
                if completed_keys.contains(&l.key()) {
                    completed += 1;
                }
            }
            competencies.push(CompetencyStatistic {
                subject: s,
                competency: c,
                label: c.label(),
                completed,
                total,
                percentage: percentage(completed, total),
            });
        }
    }

    let num: usize = competencies.iter().map(|c| c.completed).sum();
    let den: usize = competencies.iter().map(|c| c.total).sum();
    let lessons_total = catalog.lessons_for(subject).count();
    let lessons_completed = completed_keys.len();
    let raw_completed_count = lessons_completed
        + if opts.count_orphans_in_raw {
            orphaned_completed
        } else {
            0
        };

    StudentStatistics {
        student_id: student_id.to_string(),
        subject,
        competencies,
        overall: CompletionRatio {
            completed: num,
            total: den,
            percentage: percentage(num, den),
        },
        lessons_completed,
        lessons_total,
        orphaned_count,
        raw_completed_count,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCompetencyMean {
    pub subject: Subject,
    pub competency: Competency,
    pub label: &'static str,
    pub mean_percentage: Option<f64>,
    pub students_counted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStatistics {
    pub subject: Option<Subject>,
    pub students: Vec<StudentStatistics>,
    pub competency_means: Vec<ClassCompetencyMean>,
    pub overall_mean: Option<f64>,
    pub overall_students_counted: usize,
    pub orphaned_count: usize,
}

/// Arithmetic mean of the defined values, one decimal. Undefined values are skipped.
pub fn mean_of_defined<I>(values: I) -> (Option<f64>, usize)
where
    I: IntoIterator<Item = Option<i64>>,
{
    let mut sum = 0i64;
    let mut n = 0usize;
    for v in values.into_iter().flatten() {
        sum += v;
        n += 1;
    }
    if n == 0 {
        return (None, 0);
    }
    (Some(round_off_1_decimal(sum as f64 / n as f64)), n)
}

pub fn compute_class_statistics(
    catalog: &Catalog,
    roster: &[(String, Vec<StudentProgressEntry>)],
    subject: Option<Subject>,
    opts: ReconcileOptions,
) -> ClassStatistics {
    let students: Vec<StudentStatistics> = roster
        .iter()
        .map(|(id, entries)| compute_student_statistics(catalog, id, entries, subject, opts))
        .collect();

    let competency_means = Subject::selected(subject)
        .into_iter()
        .flat_map(|s| s.competencies().iter().copied())
        .map(|c| {
            let (mean_percentage, students_counted) = mean_of_defined(
                students
                    .iter()
                    .map(|st| st.competency(c).and_then(|x| x.percentage)),
            );
            ClassCompetencyMean {
                subject: c.subject(),
                competency: c,
                label: c.label(),
                mean_percentage,
                students_counted,
            }
        })
        .collect();

    let (overall_mean, overall_students_counted) =
        mean_of_defined(students.iter().map(|s| s.overall.percentage));
    let orphaned_count = students.iter().map(|s| s.orphaned_count).sum();

    ClassStatistics {
        subject,
        students,
        competency_means,
        overall_mean,
        overall_students_counted,
        orphaned_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::lesson;
    use crate::catalog::LessonKey;

    fn entry(student: &str, subject: Subject, seq: i64, completed: bool) -> StudentProgressEntry {
        StudentProgressEntry {
            id: format!("{}-{}-{}", student, subject, seq),
            student_id: student.to_string(),
            subject,
            seq,
            completed,
            completed_at: completed.then(|| "2026-10-01T00:00:00.000000Z".to_string()),
            note: None,
            created_at: "2026-10-01T00:00:00.000000Z".to_string(),
            updated_at: "2026-10-01T00:00:00.000000Z".to_string(),
        }
    }

    fn french_catalog() -> Catalog {
        let mut lessons = Vec::new();
        for seq in 1..=4 {
            lessons.push(lesson(Subject::French, seq, &[Competency::Lire]));
        }
        for seq in 5..=8 {
            lessons.push(lesson(Subject::French, seq, &[Competency::Ecrire]));
        }
        Catalog::from_parts(1, lessons, vec![LessonKey::new(Subject::French, 99)])
    }

    #[test]
    fn round_off_rounds_half_up_to_one_decimal() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(33.3333), 33.3);
    }

    #[test]
    fn percentage_rounds_half_up_and_is_undefined_on_empty() {
        assert_eq!(percentage(0, 0), None);
        assert_eq!(percentage(1, 8), Some(13));
        assert_eq!(percentage(1, 3), Some(33));
        assert_eq!(percentage(2, 3), Some(67));
        assert_eq!(percentage(4, 4), Some(100));
    }

    #[test]
    fn two_of_eight_french_lessons() {
        let cat = french_catalog();
        let entries = vec![
            entry("A", Subject::French, 1, true),
            entry("A", Subject::French, 2, true),
        ];
        let st = compute_student_statistics(
            &cat,
            "A",
            &entries,
            Some(Subject::French),
            ReconcileOptions::default(),
        );
        assert_eq!(st.competency(Competency::Lire).unwrap().percentage, Some(50));
        assert_eq!(st.competency(Competency::Ecrire).unwrap().percentage, Some(0));
        let oral = st.competency(Competency::Communiquer).unwrap();
        assert_eq!(oral.total, 0);
        assert_eq!(oral.percentage, None);
        assert_eq!(st.overall.completed, 2);
        assert_eq!(st.overall.total, 8);
        assert_eq!(st.overall.percentage, Some(25));
        assert_eq!(st.competencies.len(), 3);
    }

    #[test]
    fn no_progress_gives_zero_not_undefined() {
        let cat = french_catalog();
        let st = compute_student_statistics(&cat, "B", &[], None, ReconcileOptions::default());
        assert_eq!(st.competency(Competency::Lire).unwrap().percentage, Some(0));
        assert_eq!(st.competency(Competency::Resoudre).unwrap().percentage, None);
        assert_eq!(st.overall.percentage, Some(0));
        assert_eq!(st.orphaned_count, 0);
        assert_eq!(st.competencies.len(), 6);
    }

    #[test]
    fn orphans_are_counted_but_never_in_denominators() {
        let cat = french_catalog();
        let entries = vec![
            entry("A", Subject::French, 1, true),
            entry("A", Subject::French, 99, true),
            entry("A", Subject::French, 98, false),
            entry("A", Subject::Math, 3, true),
        ];
        let st = compute_student_statistics(
            &cat,
            "A",
            &entries,
            Some(Subject::French),
            ReconcileOptions::default(),
        );
        assert_eq!(st.orphaned_count, 2);
        assert_eq!(st.overall.total, 8);
        assert_eq!(st.overall.completed, 1);
        assert_eq!(st.raw_completed_count, 1);

        let counted = compute_student_statistics(
            &cat,
            "A",
            &entries,
            Some(Subject::French),
            ReconcileOptions {
                count_orphans_in_raw: true,
            },
        );
        assert_eq!(counted.raw_completed_count, 2);
        assert_eq!(counted.overall, st.overall);
    }

    #[test]
    fn incomplete_rows_do_not_count() {
        let cat = french_catalog();
        let entries = vec![entry("A", Subject::French, 5, false)];
        let st = compute_student_statistics(&cat, "A", &entries, None, ReconcileOptions::default());
        assert_eq!(st.competency(Competency::Ecrire).unwrap().completed, 0);
        assert_eq!(st.lessons_completed, 0);
    }

    #[test]
    fn multi_tag_lessons_count_in_each_competency() {
        let cat = Catalog::from_parts(
            1,
            vec![
                lesson(Subject::Math, 1, &[Competency::Resoudre, Competency::CommuniquerMath]),
                lesson(Subject::Math, 2, &[Competency::Raisonner]),
            ],
            Vec::new(),
        );
        let entries = vec![entry("A", Subject::Math, 1, true)];
        let st = compute_student_statistics(&cat, "A", &entries, Some(Subject::Math), ReconcileOptions::default());
        assert_eq!(st.overall.completed, 2);
        assert_eq!(st.overall.total, 3);
        assert_eq!(st.overall.percentage, Some(67));
        assert_eq!(st.lessons_completed, 1);
        assert_eq!(st.lessons_total, 2);
    }

    #[test]
    fn class_mean_skips_undefined_students() {
        let cat = french_catalog();
        let roster = vec![
            ("A".to_string(), vec![entry("A", Subject::French, 1, true), entry("A", Subject::French, 2, true)]),
            ("B".to_string(), vec![entry("B", Subject::French, 1, true)]),
            ("C".to_string(), Vec::new()),
        ];
        let cls = compute_class_statistics(&cat, &roster, Some(Subject::French), ReconcileOptions::default());
        assert_eq!(cls.students.len(), 3);

        let lire = cls
            .competency_means
            .iter()
            .find(|m| m.competency == Competency::Lire)
            .unwrap();
        // 50, 25, 0
        assert_eq!(lire.mean_percentage, Some(25.0));
        assert_eq!(lire.students_counted, 3);

        let oral = cls
            .competency_means
            .iter()
            .find(|m| m.competency == Competency::Communiquer)
            .unwrap();
        assert_eq!(oral.mean_percentage, None);
        assert_eq!(oral.students_counted, 0);
    }

    #[test]
    fn mean_of_defined_ignores_none() {
        assert_eq!(mean_of_defined(vec![Some(50), None, Some(25)]), (Some(37.5), 2));
        assert_eq!(mean_of_defined(vec![None::<i64>, None]), (None, 0));
        assert_eq!(mean_of_defined(Vec::<Option<i64>>::new()), (None, 0));
    }
}
