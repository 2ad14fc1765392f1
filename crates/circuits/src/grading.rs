//! Grade commitment engine.
//!
//! A test has `n_questions` questions and commits to two answer keys:
//! - the multiple choice answers, as the root of their field encodings;
//! - the open answers, as the root of their hashes.
//!
//! Both keys are complete trees of height `test_height`. Slots beyond
//! `n_questions` hold the empty-answer value on both sides, so they always
//! match and are subtracted from the open answer count.
//!
//! ```text
//! weighted_grade = n * w * mc_ok + (100 - w) * open_correct
//! grade          = weighted_grade / n
//! passed         = weighted_grade >= minimum_grade * n
//! ```

use ark_bn254::Fr;
use thiserror::Error;

use crate::field::keccak_to_field;
use crate::identity::{grade_commitment, Identity};
use crate::merkle::{root_from_leaves, MerkleError};
use crate::poseidon::PoseidonHasher;

/// Default height of answer trees (64 questions)
pub const TEST_HEIGHT: usize = 6;

/// Grades and weights are percentages
pub const MAX_GRADE: u8 = 100;

/// Invalid test configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    #[error("minimum grade {0} exceeds 100")]
    MinimumGrade(u8),
    #[error("multiple choice weight {0} exceeds 100")]
    MultipleChoiceWeight(u8),
    #[error("question count {n_questions} outside 1..={max}")]
    QuestionCount { n_questions: u32, max: u64 },
}

/// Errors while grading an attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GradingError {
    #[error("invalid test parameters: {0}")]
    Parameters(#[from] ParameterError),
    #[error("{count} multiple choice answers exceed {max} slots")]
    TooManyMultipleChoiceAnswers { count: usize, max: usize },
    #[error("expected {expected} open answers, got {got}")]
    OpenAnswerCount { expected: usize, got: usize },
    #[error("expected {expected} answer hashes, got {got}")]
    AnswerHashCount { expected: usize, got: usize },
    #[error("answer hashes do not match the committed open answers root")]
    AnswerKeyMismatch,
    #[error("merkle error: {0}")]
    Merkle(#[from] MerkleError),
}

/// Test configuration fixed when a credential is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TestParameters {
    /// Minimum grade to pass, 0..=100
    pub minimum_grade: u8,

    /// Share of the grade given by the multiple choice part, 0..=100
    pub multiple_choice_weight: u8,

    /// Number of questions, 1..=2^test_height
    pub n_questions: u32,

    /// Root of the multiple choice answer key
    pub multiple_choice_root: Fr,

    /// Root of the open answer hashes
    pub open_answers_hashes_root: Fr,
}

impl TestParameters {
    pub fn validate(&self, test_height: usize) -> Result<(), ParameterError> {
        if self.minimum_grade > MAX_GRADE {
            return Err(ParameterError::MinimumGrade(self.minimum_grade));
        }
        if self.multiple_choice_weight > MAX_GRADE {
            return Err(ParameterError::MultipleChoiceWeight(
                self.multiple_choice_weight,
            ));
        }
        let max = 1u64 << test_height;
        if self.n_questions == 0 || self.n_questions as u64 > max {
            return Err(ParameterError::QuestionCount {
                n_questions: self.n_questions,
                max,
            });
        }
        Ok(())
    }

    /// H(multiple_choice_root, open_answers_hashes_root)
    pub fn test_root(&self, hasher: &PoseidonHasher) -> Fr {
        hasher.hash_two(self.multiple_choice_root, self.open_answers_hashes_root)
    }

    /// H(minimum_grade, multiple_choice_weight, n_questions)
    pub fn parameters_hash(&self, hasher: &PoseidonHasher) -> Fr {
        hasher.hash(&[
            Fr::from(self.minimum_grade as u64),
            Fr::from(self.multiple_choice_weight as u64),
            Fr::from(self.n_questions as u64),
        ])
    }
}

/// Outcome of grading one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradeResult {
    /// weighted_grade / n_questions, 0..=100
    pub grade: u64,

    pub weighted_grade: u64,

    /// Points from the multiple choice part: the weight or 0
    pub multiple_choice_grade: u64,

    /// Points from the open answers, out of 100 - weight
    pub open_answers_grade: u64,

    /// Matching open answer slots, padding included
    pub n_correct: u64,

    pub passed: bool,
    pub identity_commitment: Fr,
    pub grade_commitment: Fr,
}

/// Padded answer arrays as they enter the test circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerWitness {
    /// Field encodings of the user's multiple choice answers
    pub multiple_choice: Vec<Fr>,

    /// Field encodings of the user's open answers
    pub open_answers: Vec<Fr>,

    /// Answer key hashes
    pub answer_hashes: Vec<Fr>,
}

/// Canonical field encoding of a set of selected options.
///
/// Options are sorted and deduplicated, so `[2, 0, 2]` and `[0, 2]` encode
/// alike.
pub fn multiple_choice_field(selected: &[u32]) -> Fr {
    let mut options = selected.to_vec();
    options.sort_unstable();
    options.dedup();
    let joined = options
        .iter()
        .map(|option| option.to_string())
        .collect::<Vec<_>>()
        .join(",");
    keccak_to_field(joined.as_bytes())
}

/// Field encoding of an open answer.
pub fn open_answer_field(answer: &str) -> Fr {
    keccak_to_field(answer.as_bytes())
}

/// Grades attempts for tests of one answer tree height.
#[derive(Clone, Debug)]
pub struct Grader {
    hasher: PoseidonHasher,
    test_height: usize,
}

impl Grader {
    pub fn new(hasher: PoseidonHasher, test_height: usize) -> Self {
        Self {
            hasher,
            test_height,
        }
    }

    pub fn hasher(&self) -> &PoseidonHasher {
        &self.hasher
    }

    pub fn test_height(&self) -> usize {
        self.test_height
    }

    /// Number of answer slots (2^test_height).
    pub fn width(&self) -> usize {
        1 << self.test_height
    }

    /// H(open_answer_field(answer))
    pub fn answer_hash(&self, answer: &str) -> Fr {
        self.hasher.hash_one(open_answer_field(answer))
    }

    /// Hash of an unanswered slot.
    pub fn empty_answer_hash(&self) -> Fr {
        self.answer_hash("")
    }

    /// Root of a multiple choice answer list, padded with zero.
    pub fn multiple_choice_root(&self, answers: &[Vec<u32>]) -> Result<Fr, GradingError> {
        let fields = self.multiple_choice_fields(answers)?;
        Ok(root_from_leaves(
            &self.hasher,
            &fields,
            self.test_height,
            Fr::from(0u64),
        )?)
    }

    /// Root of an answer hash list, padded with the empty answer hash.
    pub fn open_answers_hashes_root(&self, hashes: &[Fr]) -> Result<Fr, GradingError> {
        Ok(root_from_leaves(
            &self.hasher,
            hashes,
            self.test_height,
            self.empty_answer_hash(),
        )?)
    }

    /// Build test parameters from plaintext answer keys.
    ///
    /// Returns the parameters and the open answer hashes to reveal later.
    pub fn build_parameters(
        &self,
        minimum_grade: u8,
        multiple_choice_weight: u8,
        n_questions: u32,
        multiple_choice_key: &[Vec<u32>],
        open_answers_key: &[String],
    ) -> Result<(TestParameters, Vec<Fr>), GradingError> {
        if open_answers_key.len() != n_questions as usize {
            return Err(GradingError::OpenAnswerCount {
                expected: n_questions as usize,
                got: open_answers_key.len(),
            });
        }

        let answer_hashes: Vec<Fr> = open_answers_key
            .iter()
            .map(|answer| self.answer_hash(answer))
            .collect();

        let params = TestParameters {
            minimum_grade,
            multiple_choice_weight,
            n_questions,
            multiple_choice_root: self.multiple_choice_root(multiple_choice_key)?,
            open_answers_hashes_root: self.open_answers_hashes_root(&answer_hashes)?,
        };
        params.validate(self.test_height)?;

        Ok((params, answer_hashes))
    }

    /// Pad and encode an attempt for grading and proving.
    pub fn answer_witness(
        &self,
        multiple_choice_answers: &[Vec<u32>],
        open_answers: &[String],
        params: &TestParameters,
        answer_hashes: &[Fr],
    ) -> Result<AnswerWitness, GradingError> {
        params.validate(self.test_height)?;
        let n = params.n_questions as usize;

        if open_answers.len() != n {
            return Err(GradingError::OpenAnswerCount {
                expected: n,
                got: open_answers.len(),
            });
        }
        if answer_hashes.len() != n {
            return Err(GradingError::AnswerHashCount {
                expected: n,
                got: answer_hashes.len(),
            });
        }
        if self.open_answers_hashes_root(answer_hashes)? != params.open_answers_hashes_root {
            return Err(GradingError::AnswerKeyMismatch);
        }

        let mut multiple_choice = self.multiple_choice_fields(multiple_choice_answers)?;
        multiple_choice.resize(self.width(), Fr::from(0u64));

        let mut open_fields: Vec<Fr> = open_answers
            .iter()
            .map(|answer| open_answer_field(answer))
            .collect();
        open_fields.resize(self.width(), open_answer_field(""));

        let mut key = answer_hashes.to_vec();
        key.resize(self.width(), self.empty_answer_hash());

        Ok(AnswerWitness {
            multiple_choice,
            open_answers: open_fields,
            answer_hashes: key,
        })
    }

    /// Grade an attempt and derive its commitments.
    pub fn grade(
        &self,
        identity: &Identity,
        multiple_choice_answers: &[Vec<u32>],
        open_answers: &[String],
        params: &TestParameters,
        answer_hashes: &[Fr],
    ) -> Result<GradeResult, GradingError> {
        let witness =
            self.answer_witness(multiple_choice_answers, open_answers, params, answer_hashes)?;
        Ok(self.grade_witness(identity, &witness, params))
    }

    /// Grade an already padded attempt.
    pub fn grade_witness(
        &self,
        identity: &Identity,
        witness: &AnswerWitness,
        params: &TestParameters,
    ) -> GradeResult {
        let n = params.n_questions as u64;
        let weight = params.multiple_choice_weight as u64;

        let mc_root = root_from_leaves(
            &self.hasher,
            &witness.multiple_choice,
            self.test_height,
            Fr::from(0u64),
        );
        let mc_ok = matches!(mc_root, Ok(root) if root == params.multiple_choice_root);

        let n_correct = witness
            .open_answers
            .iter()
            .zip(witness.answer_hashes.iter())
            .filter(|(answer, expected)| self.hasher.hash_one(**answer) == **expected)
            .count() as u64;
        let padding = self.width() as u64 - n;
        let open_correct = n_correct.saturating_sub(padding);

        let mc_points = if mc_ok { n * weight } else { 0 };
        let open_points = (MAX_GRADE as u64 - weight) * open_correct;
        let weighted_grade = mc_points + open_points;

        let identity_commitment = identity.commitment(&self.hasher);

        GradeResult {
            grade: weighted_grade / n,
            weighted_grade,
            multiple_choice_grade: mc_points / n,
            open_answers_grade: open_points / n,
            n_correct,
            passed: weighted_grade >= params.minimum_grade as u64 * n,
            identity_commitment,
            grade_commitment: grade_commitment(&self.hasher, identity_commitment, weighted_grade),
        }
    }

    fn multiple_choice_fields(&self, answers: &[Vec<u32>]) -> Result<Vec<Fr>, GradingError> {
        if answers.len() > self.width() {
            return Err(GradingError::TooManyMultipleChoiceAnswers {
                count: answers.len(),
                max: self.width(),
            });
        }
        Ok(answers
            .iter()
            .map(|selected| multiple_choice_field(selected))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::{rngs::StdRng, SeedableRng};
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    struct Fixture {
        grader: Grader,
        params: TestParameters,
        answer_hashes: Vec<Fr>,
        mc_key: Vec<Vec<u32>>,
        open_key: Vec<String>,
    }

    fn fixture(minimum_grade: u8, weight: u8) -> Fixture {
        let grader = Grader::new(PoseidonHasher::new(), 2);
        let mc_key = vec![vec![1], vec![0, 2], vec![3]];
        let open_key = strings(&["paris", "42", "rust"]);
        let (params, answer_hashes) = grader
            .build_parameters(minimum_grade, weight, 3, &mc_key, &open_key)
            .unwrap();
        Fixture {
            grader,
            params,
            answer_hashes,
            mc_key,
            open_key,
        }
    }

    fn identity() -> Identity {
        Identity::new(Fr::from(11u64), Fr::from(22u64))
    }

    #[test]
    fn test_multiple_choice_canonical() {
        assert_eq!(multiple_choice_field(&[2, 0, 2]), multiple_choice_field(&[0, 2]));
        assert_ne!(multiple_choice_field(&[0, 2]), multiple_choice_field(&[0, 1]));
        assert_eq!(multiple_choice_field(&[1, 12]), keccak_to_field(b"1,12"));
    }

    #[test]
    fn test_perfect_attempt() {
        let f = fixture(50, 50);
        let result = f
            .grader
            .grade(&identity(), &f.mc_key, &f.open_key, &f.params, &f.answer_hashes)
            .unwrap();

        assert_eq!(result.weighted_grade, 300);
        assert_eq!(result.grade, 100);
        assert_eq!(result.multiple_choice_grade, 50);
        assert_eq!(result.open_answers_grade, 50);
        assert_eq!(result.n_correct, 4, "padding slot counts");
        assert!(result.passed);
    }

    #[test]
    fn test_multiple_choice_weight_gates() {
        let f = fixture(50, 50);
        let wrong_mc = vec![vec![1], vec![0, 2], vec![2]];

        let result = f
            .grader
            .grade(&identity(), &wrong_mc, &f.open_key, &f.params, &f.answer_hashes)
            .unwrap();

        // any wrong choice forfeits the whole multiple choice weight
        assert_eq!(result.multiple_choice_grade, 0);
        assert_eq!(result.weighted_grade, 150);
        assert_eq!(result.grade, 50);
        assert!(result.passed, "threshold is inclusive");
    }

    #[test]
    fn test_open_answers_all_wrong() {
        let f = fixture(50, 50);
        let wrong_open = strings(&["london", "41", "go"]);

        let result = f
            .grader
            .grade(&identity(), &f.mc_key, &wrong_open, &f.params, &f.answer_hashes)
            .unwrap();

        assert_eq!(result.multiple_choice_grade, 50);
        assert_eq!(result.open_answers_grade, 0);
        assert_eq!(result.n_correct, 1, "only the padding slot");
        assert_eq!(result.weighted_grade, 150);
        assert_eq!(result.grade, 50);
        assert!(result.passed);
    }

    #[test]
    fn test_inclusive_threshold() {
        // n = 2, weight 2: one open answer right and wrong choices = 98 / 2 = 49
        let grader = Grader::new(PoseidonHasher::new(), 2);
        let open_key = strings(&["a", "b"]);
        let mc_key = vec![vec![0], vec![1]];

        let (params, hashes) = grader.build_parameters(50, 2, 2, &mc_key, &open_key).unwrap();
        let attempt = strings(&["a", "x"]);
        let result = grader
            .grade(&identity(), &[vec![1], vec![1]], &attempt, &params, &hashes)
            .unwrap();
        assert_eq!(result.grade, 49);
        assert!(!result.passed);

        // weight 0: one of two open answers = exactly 50
        let (params, hashes) = grader.build_parameters(50, 0, 2, &mc_key, &open_key).unwrap();
        let result = grader
            .grade(&identity(), &mc_key, &attempt, &params, &hashes)
            .unwrap();
        assert_eq!(result.grade, 50);
        assert!(result.passed);

        let (params, hashes) = grader.build_parameters(51, 0, 2, &mc_key, &open_key).unwrap();
        let result = grader
            .grade(&identity(), &mc_key, &attempt, &params, &hashes)
            .unwrap();
        assert!(!result.passed);
    }

    #[test]
    fn test_answer_counts_enforced() {
        let f = fixture(50, 50);

        assert_eq!(
            f.grader
                .grade(&identity(), &f.mc_key, &strings(&["paris"]), &f.params, &f.answer_hashes),
            Err(GradingError::OpenAnswerCount { expected: 3, got: 1 })
        );
        assert_eq!(
            f.grader
                .grade(&identity(), &f.mc_key, &f.open_key, &f.params, &f.answer_hashes[..2]),
            Err(GradingError::AnswerHashCount { expected: 3, got: 2 })
        );
        let too_many = vec![vec![0]; 5];
        assert!(matches!(
            f.grader
                .grade(&identity(), &too_many, &f.open_key, &f.params, &f.answer_hashes),
            Err(GradingError::TooManyMultipleChoiceAnswers { count: 5, max: 4 })
        ));
    }

    #[test]
    fn test_wrong_answer_key_rejected() {
        let f = fixture(50, 50);
        let mut hashes = f.answer_hashes.clone();
        hashes[0] = f.grader.answer_hash("london");

        assert_eq!(
            f.grader
                .grade(&identity(), &f.mc_key, &f.open_key, &f.params, &hashes),
            Err(GradingError::AnswerKeyMismatch)
        );
    }

    #[test]
    fn test_parameter_validation() {
        let f = fixture(50, 50);

        let mut params = f.params;
        params.minimum_grade = 101;
        assert_eq!(params.validate(2), Err(ParameterError::MinimumGrade(101)));

        let mut params = f.params;
        params.multiple_choice_weight = 200;
        assert!(params.validate(2).is_err());

        let mut params = f.params;
        params.n_questions = 5;
        assert_eq!(
            params.validate(2),
            Err(ParameterError::QuestionCount { n_questions: 5, max: 4 })
        );
        params.n_questions = 0;
        assert!(params.validate(2).is_err());
    }

    #[test]
    fn test_parameters_bind_test() {
        let hasher = PoseidonHasher::new();
        let f = fixture(50, 50);
        let mut other = f.params;
        other.minimum_grade = 60;

        assert_ne!(f.params.parameters_hash(&hasher), other.parameters_hash(&hasher));
        assert_eq!(f.params.test_root(&hasher), other.test_root(&hasher));
    }

    #[test]
    fn test_commitments_unique_over_sample() {
        let f = fixture(0, 50);
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = HashSet::new();

        for _ in 0..100 {
            let user = Identity::random(&mut rng);
            let result = f
                .grader
                .grade(&user, &f.mc_key, &f.open_key, &f.params, &f.answer_hashes)
                .unwrap();
            assert!(seen.insert(result.grade_commitment.to_string()));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_grade_deterministic_and_bounded(
            weight in 0u8..=100,
            minimum in 0u8..=100,
            right in prop::collection::vec(any::<bool>(), 3),
            mc_right in any::<bool>(),
        ) {
            let f = fixture(minimum, weight);
            let attempt: Vec<String> = right
                .iter()
                .zip(f.open_key.iter())
                .map(|(ok, key)| if *ok { key.clone() } else { format!("not {}", key) })
                .collect();
            let mc = if mc_right { f.mc_key.clone() } else { vec![vec![9]] };

            let first = f.grader.grade(&identity(), &mc, &attempt, &f.params, &f.answer_hashes).unwrap();
            let second = f.grader.grade(&identity(), &mc, &attempt, &f.params, &f.answer_hashes).unwrap();
            prop_assert_eq!(&first, &second);

            let open_correct = right.iter().filter(|ok| **ok).count() as u64;
            let mc_points = if mc_right { 3 * weight as u64 } else { 0 };
            let expected = mc_points + (100 - weight as u64) * open_correct;
            prop_assert_eq!(first.weighted_grade, expected);
            prop_assert!(first.grade <= 100);
            prop_assert_eq!(first.passed, expected >= minimum as u64 * 3);
        }
    }
}
