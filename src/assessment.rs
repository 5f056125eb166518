//! Assessment kinds and their per-table normalization rules.
//!
//! Every scored export shares the same pipeline; only the grade denominator
//! and the item denominators differ, so those live here as static data.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AssessmentKind {
    #[serde(rename = "Test_1")]
    Test1,
    #[serde(rename = "Test_2")]
    Test2,
    #[serde(rename = "Test_3")]
    Test3,
    #[serde(rename = "Test_4")]
    Test4,
    #[serde(rename = "Mock_Test")]
    MockTest,
    #[serde(rename = "Sum_Test")]
    SumTest,
    #[serde(rename = "Student_Rate")]
    StudentRate,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown assessment '{0}', expected one of Test_1, Test_2, Test_3, Test_4, Mock_Test, Sum_Test, Student_Rate")]
pub struct UnknownAssessment(pub String);

impl AssessmentKind {
    /// Order in which a normalization run processes the exports.
    pub const RUN_ORDER: [AssessmentKind; 7] = [
        AssessmentKind::Test1,
        AssessmentKind::Test2,
        AssessmentKind::Test3,
        AssessmentKind::Test4,
        AssessmentKind::MockTest,
        AssessmentKind::StudentRate,
        AssessmentKind::SumTest,
    ];

    pub const FORMATIVE: [AssessmentKind; 5] = [
        AssessmentKind::Test1,
        AssessmentKind::Test2,
        AssessmentKind::Test3,
        AssessmentKind::Test4,
        AssessmentKind::MockTest,
    ];

    /// Tables that carry a `Grade` per student.
    pub const GRADED: [AssessmentKind; 6] = [
        AssessmentKind::Test1,
        AssessmentKind::Test2,
        AssessmentKind::Test3,
        AssessmentKind::Test4,
        AssessmentKind::MockTest,
        AssessmentKind::SumTest,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            AssessmentKind::Test1 => "Test_1",
            AssessmentKind::Test2 => "Test_2",
            AssessmentKind::Test3 => "Test_3",
            AssessmentKind::Test4 => "Test_4",
            AssessmentKind::MockTest => "Mock_Test",
            AssessmentKind::SumTest => "Sum_Test",
            AssessmentKind::StudentRate => "Student_Rate",
        }
    }

    /// Scoring rule, or `None` for the participation table which is only
    /// null-filled.
    pub fn rule(self) -> Option<&'static ScoringRule> {
        match self {
            AssessmentKind::Test1 => Some(&TEST_1),
            AssessmentKind::Test2 => Some(&TEST_2),
            AssessmentKind::Test3 => Some(&TEST_3),
            AssessmentKind::Test4 => Some(&TEST_4),
            AssessmentKind::MockTest => Some(&MOCK_TEST),
            AssessmentKind::SumTest => Some(&SUM_TEST),
            AssessmentKind::StudentRate => None,
        }
    }
}

impl fmt::Display for AssessmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for AssessmentKind {
    type Err = UnknownAssessment;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AssessmentKind::RUN_ORDER
            .into_iter()
            .find(|kind| kind.table_name() == value)
            .ok_or_else(|| UnknownAssessment(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemScaling {
    /// Fractional score already on a 0-1 scale; stored as a percentage.
    Percent,
    /// Raw points out of the item's maximum; stored on the 0-10000 scale.
    Canonical,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemRule {
    pub number: u8,
    pub raw_max: u32,
    pub scaling: ItemScaling,
}

impl ItemRule {
    const fn percent(number: u8) -> Self {
        ItemRule {
            number,
            raw_max: 100,
            scaling: ItemScaling::Percent,
        }
    }

    const fn canonical(number: u8, raw_max: u32) -> Self {
        ItemRule {
            number,
            raw_max,
            scaling: ItemScaling::Canonical,
        }
    }

    pub fn label(&self) -> String {
        format!("Q{}", self.number)
    }

    /// Header as it appears in the export, e.g. `Q 4 /200`.
    pub fn raw_header(&self) -> String {
        format!("Q {} /{}", self.number, self.raw_max)
    }

    pub fn scale(&self, raw: f64) -> i64 {
        match self.scaling {
            ItemScaling::Percent => round_half_even(raw * 100.0),
            ItemScaling::Canonical => round_half_even(raw * (10_000.0 / self.raw_max as f64)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRule {
    pub grade_denominator: u32,
    pub items: &'static [ItemRule],
}

/// Header renames shared by every scored export.
const COMMON_RENAMES: [(&str, &str); 3] = [
    ("research id", "student_id"),
    ("Started on", "Started_on"),
    ("Time taken", "Time_taken"),
];

/// Metadata that never reaches the store.
pub const DROPPED_COLUMNS: [&str; 3] = ["State", "Time_taken", "Started_on"];

impl ScoringRule {
    pub fn grade_header(&self) -> String {
        format!("Grade/{}", self.grade_denominator)
    }

    /// Raw header to canonical name, for every column this rule knows.
    pub fn renames(&self) -> Vec<(String, String)> {
        let mut renames: Vec<(String, String)> = COMMON_RENAMES
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        renames.push((self.grade_header(), crate::models::GRADE.to_string()));
        renames.extend(self.items.iter().map(|item| (item.raw_header(), item.label())));
        renames
    }

    pub fn scale_grade(&self, raw: f64) -> i64 {
        round_half_even(raw * (10_000.0 / self.grade_denominator as f64))
    }

    pub fn item(&self, label: &str) -> Option<&ItemRule> {
        self.items.iter().find(|item| item.label() == label)
    }
}

/// Rounds to the nearest integer, ties to even.
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

static TEST_1: ScoringRule = ScoringRule {
    grade_denominator: 600,
    items: &[
        ItemRule::percent(1),
        ItemRule::percent(2),
        ItemRule::percent(3),
        ItemRule::percent(4),
        ItemRule::percent(5),
        ItemRule::percent(6),
    ],
};

static TEST_2: ScoringRule = ScoringRule {
    grade_denominator: 700,
    items: &[
        ItemRule::percent(1),
        ItemRule::percent(2),
        ItemRule::percent(3),
        ItemRule::canonical(4, 200),
        ItemRule::percent(5),
        ItemRule::percent(6),
    ],
};

static TEST_3: ScoringRule = ScoringRule {
    grade_denominator: 600,
    items: &[
        ItemRule::percent(1),
        ItemRule::percent(2),
        ItemRule::percent(3),
        ItemRule::percent(4),
        ItemRule::percent(5),
        ItemRule::percent(6),
    ],
};

static TEST_4: ScoringRule = ScoringRule {
    grade_denominator: 1000,
    items: &[ItemRule::canonical(1, 500), ItemRule::canonical(2, 500)],
};

static MOCK_TEST: ScoringRule = ScoringRule {
    grade_denominator: 10_000,
    items: &[
        ItemRule::canonical(1, 500),
        ItemRule::canonical(2, 300),
        ItemRule::canonical(3, 600),
        ItemRule::canonical(4, 700),
        ItemRule::canonical(5, 500),
        ItemRule::canonical(6, 400),
        ItemRule::canonical(7, 1000),
        ItemRule::canonical(8, 2000),
        ItemRule::canonical(9, 2000),
        ItemRule::canonical(10, 2000),
    ],
};

static SUM_TEST: ScoringRule = ScoringRule {
    grade_denominator: 10_000,
    items: &[
        ItemRule::canonical(1, 500),
        ItemRule::canonical(2, 300),
        ItemRule::canonical(3, 600),
        ItemRule::canonical(4, 700),
        ItemRule::canonical(5, 400),
        ItemRule::canonical(6, 500),
        ItemRule::canonical(7, 1500),
        ItemRule::canonical(8, 1500),
        ItemRule::canonical(9, 1500),
        ItemRule::canonical(10, 1000),
        ItemRule::canonical(11, 400),
        ItemRule::canonical(12, 500),
        ItemRule::canonical(13, 600),
    ],
};
