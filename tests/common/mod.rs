//! Shared fixtures for integration tests
//!
//! Generates a deterministic passenger dataset in the same CSV layout as the
//! public Titanic training file. Survival follows sex, with every 20th label
//! flipped so the classifier cannot reach a perfect score.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const HEADER: &str =
    "PassengerId,Survived,Pclass,Name,Sex,Age,SibSp,Parch,Ticket,Fare,Cabin,Embarked";

/// Build `rows` CSV lines (plus header) from a fixed seed
pub fn synthetic_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');

    for i in 0..rows {
        let female = rng.gen_bool(0.4);
        let mut survived = female;
        if i % 20 == 0 {
            survived = !survived;
        }
        let pclass = rng.gen_range(1..=3);
        let age = if i % 7 == 0 {
            String::new()
        } else {
            format!("{:.0}", rng.gen_range(1.0..75.0))
        };
        let fare = match pclass {
            1 => rng.gen_range(30.0..250.0),
            2 => rng.gen_range(10.0..40.0),
            _ => rng.gen_range(5.0..20.0),
        };
        let embarked = if i % 50 == 3 {
            ""
        } else {
            ["S", "C", "Q"][rng.gen_range(0..3)]
        };

        writeln!(
            out,
            "{},{},{},\"Passenger, {}. No{}\",{},{},{},{},T{},{:.4},,{}",
            i + 1,
            u8::from(survived),
            pclass,
            if female { "Mrs" } else { "Mr" },
            i,
            if female { "female" } else { "male" },
            age,
            rng.gen_range(0..4),
            rng.gen_range(0..3),
            1000 + i,
            fare,
            embarked,
        )
        .expect("writing to a String cannot fail");
    }
    out
}

/// Write a synthetic dataset into `dir` and return its path
pub fn write_dataset(dir: &Path, rows: usize, seed: u64) -> PathBuf {
    let path = dir.join("train.csv");
    std::fs::write(&path, synthetic_csv(rows, seed)).expect("write dataset");
    path
}
