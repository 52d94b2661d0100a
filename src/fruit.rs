//! Fruit codes: short random shareable join codes for a gffft.

use crate::orm::gfffts;
use actix_web::{error, Error};
use rand::Rng;
use sea_orm::{entity::*, query::*, DatabaseConnection};

/// 28 symbols, no ambiguous glyphs (0/o, 1/l/i).
pub const FRUIT_ALPHABET: &[u8; 28] = b"abcdefghjkmnpqrstuvwxyz23456";

pub const FRUIT_CODE_LENGTH: usize = 9;

/// The code space practically never exhausts at this alphabet size, so
/// this is a safety bound, not an expected path. Hitting it is fatal.
pub const MAX_GENERATION_ATTEMPTS: usize = 100;

pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..FRUIT_CODE_LENGTH)
        .map(|_| FRUIT_ALPHABET[rng.gen_range(0..FRUIT_ALPHABET.len())] as char)
        .collect()
}

/// Generates a code not currently in use by any other gffft.
/// Collision-checked against the cross-gffft index, bounded attempts.
pub async fn generate_unique_fruit_code(db: &DatabaseConnection) -> Result<String, Error> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let code = generate_code(&mut rng);
        let taken = gfffts::Entity::find()
            .filter(gfffts::Column::FruitCode.eq(code.clone()))
            .one(db)
            .await
            .map_err(error::ErrorInternalServerError)?;
        if taken.is_none() {
            return Ok(code);
        }
    }
    log::error!(
        "fruit code generation exhausted {} attempts",
        MAX_GENERATION_ATTEMPTS
    );
    Err(error::ErrorInternalServerError(
        "could not allocate a unique fruit code",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_shape() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), FRUIT_CODE_LENGTH);
            assert!(code.bytes().all(|b| FRUIT_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn test_no_duplicates_at_test_bound() {
        let mut rng = rand::thread_rng();
        let mut seen = HashSet::new();
        for _ in 0..100 {
            assert!(seen.insert(generate_code(&mut rng)));
        }
    }
}
