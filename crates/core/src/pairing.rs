//! Greedy question/solution pairing over classified file names.

use crate::error::{IngestError, Result};
use crate::models::{CandidatePair, DocumentRecord, PairingOptions, PairingResult, Role};
use crate::similarity::token_similarity;
use std::collections::HashSet;
use tracing::debug;

/// Classifies and pairs a list of file names or paths. Duplicate entries
/// collapse to their first occurrence.
pub fn pair_files<S: AsRef<str>>(files: &[S], options: &PairingOptions) -> Result<PairingResult> {
    let mut seen: HashSet<&str> = HashSet::new();
    let records = files
        .iter()
        .map(|file| file.as_ref())
        .filter(|name| seen.insert(*name))
        .map(DocumentRecord::new)
        .collect();

    pair_records(records, options)
}

/// Pairs already-classified records.
///
/// The first pass walks strict solutions in input order and gives each the
/// best-scoring question still available; ties go to the earlier question and
/// nothing is revisited. The second pass sweeps what is left for any
/// complementary couple above the threshold, including note variants.
pub fn pair_records(
    records: Vec<DocumentRecord>,
    options: &PairingOptions,
) -> Result<PairingResult> {
    validate_threshold(options.threshold)?;

    let mut partner: Vec<Option<usize>> = vec![None; records.len()];

    for (solution_index, solution) in records.iter().enumerate() {
        if solution.role != Role::Solution {
            continue;
        }

        let mut best: Option<CandidatePair<'_>> = None;
        let mut best_index = None;
        for (question_index, question) in records.iter().enumerate() {
            if question.role != Role::Question || partner[question_index].is_some() {
                continue;
            }
            let score = token_similarity(&solution.base_tokens, &question.base_tokens);
            if best.map_or(true, |current| score > current.score) {
                best = Some(CandidatePair {
                    a: question,
                    b: solution,
                    score,
                });
                best_index = Some(question_index);
            }
        }

        if let (Some(candidate), Some(question_index)) = (best, best_index) {
            if candidate.score > options.threshold {
                debug!(
                    question = %candidate.a.filename,
                    solution = %candidate.b.filename,
                    score = candidate.score,
                    "paired by best match"
                );
                partner[solution_index] = Some(question_index);
                partner[question_index] = Some(solution_index);
            }
        }
    }

    for left in 0..records.len() {
        if partner[left].is_some() {
            continue;
        }
        for right in (left + 1)..records.len() {
            if partner[right].is_some() {
                continue;
            }
            let (a, b) = (&records[left], &records[right]);
            if !accepts(a.role, b.role, options) {
                continue;
            }
            let score = token_similarity(&a.base_tokens, &b.base_tokens);
            if score > options.threshold {
                debug!(left = %a.filename, right = %b.filename, score, "paired in residual sweep");
                partner[left] = Some(right);
                partner[right] = Some(left);
                break;
            }
        }
    }

    Ok(assemble(records, &partner))
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(IngestError::InvalidArgument(format!(
            "pairing threshold must be within [0, 1], got {threshold}"
        )))
    }
}

fn accepts(left: Role, right: Role, options: &PairingOptions) -> bool {
    if left.complements(right) {
        return true;
    }
    if !options.role_agnostic_fallback {
        return false;
    }

    let loose = |role: Role| !role.is_solution_like() && role != Role::Combined;
    (left.is_solution_like() && loose(right)) || (right.is_solution_like() && loose(left))
}

fn assemble(records: Vec<DocumentRecord>, partner: &[Option<usize>]) -> PairingResult {
    let mut slots: Vec<Option<DocumentRecord>> = records.into_iter().map(Some).collect();
    let mut result = PairingResult::default();

    for index in 0..slots.len() {
        let Some(record) = slots[index].take() else {
            continue;
        };

        match partner[index].and_then(|other| slots[other].take()) {
            Some(other) if record.role.is_solution_like() => result.pairs.push((other, record)),
            Some(other) => result.pairs.push((record, other)),
            None => result.unpaired.push(record),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn options(threshold: f64) -> PairingOptions {
        PairingOptions {
            threshold,
            ..PairingOptions::default()
        }
    }

    fn assert_partition(input: &[&str], result: &PairingResult) {
        let mut placed = Vec::new();
        for (question, solution) in &result.pairs {
            placed.push(question.filename.as_str());
            placed.push(solution.filename.as_str());
        }
        placed.extend(result.unpaired_names());

        let unique: BTreeSet<&str> = placed.iter().copied().collect();
        assert_eq!(unique.len(), placed.len(), "a file was placed twice");
        assert_eq!(unique, input.iter().copied().collect::<BTreeSet<_>>());
    }

    #[test]
    fn pairs_question_with_solution_and_leaves_notes() -> Result<()> {
        let files = ["Paper1_Question.pdf", "Paper1_Solution.pdf", "Topic3_Notes.pdf"];
        let result = pair_files(&files, &options(0.6))?;

        assert_eq!(result.pair_names(), vec![("Paper1_Question.pdf", "Paper1_Solution.pdf")]);
        assert_eq!(result.unpaired_names(), vec!["Topic3_Notes.pdf"]);
        assert_partition(&files, &result);
        Ok(())
    }

    #[test]
    fn differing_years_still_pair() -> Result<()> {
        let files = ["2021_JC_Prelim_Qn.pdf", "2022_JC_Prelim_Ans.pdf"];
        let result = pair_files(&files, &PairingOptions::default())?;

        assert_eq!(
            result.pair_names(),
            vec![("2021_JC_Prelim_Qn.pdf", "2022_JC_Prelim_Ans.pdf")]
        );
        assert!(result.unpaired.is_empty());
        Ok(())
    }

    #[test]
    fn pairs_are_oriented_question_first() -> Result<()> {
        let result = pair_files(&["Paper2_Ans.pdf", "Paper2_Qn.pdf"], &options(0.5))?;
        assert_eq!(result.pair_names(), vec![("Paper2_Qn.pdf", "Paper2_Ans.pdf")]);
        Ok(())
    }

    #[test]
    fn greedy_matching_never_backtracks() -> Result<()> {
        let files = ["Vectors Planes Qn.pdf", "Vectors Ans.pdf", "Vectors Planes Ans.pdf"];
        let result = pair_files(&files, &options(0.4))?;

        assert_eq!(result.pair_names(), vec![("Vectors Planes Qn.pdf", "Vectors Ans.pdf")]);
        assert_eq!(result.unpaired_names(), vec!["Vectors Planes Ans.pdf"]);
        assert_partition(&files, &result);
        Ok(())
    }

    #[test]
    fn score_must_exceed_threshold() -> Result<()> {
        let files = ["Vectors Qn.pdf", "Vectors Planes Ans.pdf"];

        let result = pair_files(&files, &options(0.5))?;
        assert!(result.pairs.is_empty());

        let result = pair_files(&files, &options(0.49))?;
        assert_eq!(result.pairs.len(), 1);
        Ok(())
    }

    #[test]
    fn note_variants_pair_in_residual_sweep() -> Result<()> {
        let files = [
            "Complex Numbers Notes Answers.pdf",
            "Complex Numbers Notes Exercises.pdf",
        ];
        let result = pair_files(&files, &PairingOptions::default())?;

        assert_eq!(
            result.pair_names(),
            vec![(
                "Complex Numbers Notes Exercises.pdf",
                "Complex Numbers Notes Answers.pdf"
            )]
        );
        Ok(())
    }

    #[test]
    fn combined_files_stay_unpaired() -> Result<()> {
        let files = ["Tutorial 3 Solutions.pdf", "Tutorial 3 Qn.pdf"];
        let result = pair_files(&files, &options(0.0))?;

        assert!(result.pairs.is_empty());
        assert_eq!(result.unpaired[0].role, Role::Combined);
        assert_partition(&files, &result);
        Ok(())
    }

    #[test]
    fn role_agnostic_fallback_accepts_unknown_partner() -> Result<()> {
        let files = ["Paper1_Ans.pdf", "Paper1.pdf"];

        let strict = pair_files(&files, &PairingOptions::default())?;
        assert!(strict.pairs.is_empty());

        let loose = pair_files(
            &files,
            &PairingOptions {
                role_agnostic_fallback: true,
                ..PairingOptions::default()
            },
        )?;
        assert_eq!(loose.pair_names(), vec![("Paper1.pdf", "Paper1_Ans.pdf")]);
        Ok(())
    }

    #[test]
    fn mixed_directory_is_a_partition() -> Result<()> {
        let files = [
            "Paper1_Question.pdf",
            "Paper1_Solution.pdf",
            "Paper2_Qn.pdf",
            "Paper2 Worked.pdf",
            "Integration Notes.pdf",
            "Tutorial 4 Answers.pdf",
            "Random.pdf",
            "Differentiation Exercises.pdf",
        ];
        let result = pair_files(&files, &PairingOptions::default())?;

        assert_eq!(result.file_count(), files.len());
        assert_eq!(result.pairs.len(), 2);
        assert_partition(&files, &result);
        Ok(())
    }

    #[test]
    fn duplicates_collapse_and_paths_are_accepted() -> Result<()> {
        let files = ["set/Paper1_Qn.pdf", "set/Paper1_Qn.pdf", "set/Paper1_Ans.pdf"];
        let result = pair_files(&files, &PairingOptions::default())?;

        assert_eq!(result.file_count(), 2);
        assert_eq!(result.pair_names(), vec![("set/Paper1_Qn.pdf", "set/Paper1_Ans.pdf")]);
        Ok(())
    }

    #[test]
    fn empty_input_gives_empty_result() -> Result<()> {
        let files: [&str; 0] = [];
        let result = pair_files(&files, &PairingOptions::default())?;
        assert!(result.pairs.is_empty());
        assert!(result.unpaired.is_empty());
        Ok(())
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        for threshold in [-0.1, 1.01, f64::NAN] {
            let err = pair_files(&["a.pdf"], &options(threshold)).unwrap_err();
            assert!(matches!(err, IngestError::InvalidArgument(_)));
        }
    }
}
