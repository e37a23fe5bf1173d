use super::Signature;
use super::implicit::{
    ANY_SCORE, DECIMAL_TO_FLOAT_BONUS, ImplicitCastConfig, NO_CAST_SCORE, SAME_CLASS_SCORE,
    implicit_cast_score,
};
use crate::types::datatype::{DataType, DataTypeId, TypeClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    /// Need to cast the type to this one.
    Cast { to: DataTypeId, score: u32 },
    /// Casting isn't needed, the original data type works.
    NoCastNeeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSignature {
    /// Index of the signature
    pub signature_idx: usize,
    /// Casts that would need to be applied in order to satisfy the signature.
    pub casts: Vec<CastType>,
    /// Sum of per-argument scores.
    pub score: u32,
}

impl CandidateSignature {
    /// Find candidate signatures for the given dataypes.
    ///
    /// Candidates are returned in sorted order with the highest score first.
    /// The sort is stable, candidates with equal scores keep the order of
    /// the signatures.
    pub fn find_candidates<'a>(
        inputs: &[DataType],
        sigs: impl IntoIterator<Item = &'a Signature>,
        conf: ImplicitCastConfig,
    ) -> Vec<Self> {
        let mut candidates = Vec::new();

        let mut buf = Vec::new();
        for (idx, sig) in sigs.into_iter().enumerate() {
            if !sig.arity_matches(inputs.len()) {
                continue;
            }

            let score = match Self::compare_and_fill_types(inputs, sig, conf, &mut buf) {
                Some(score) => score,
                None => continue,
            };

            candidates.push(CandidateSignature {
                signature_idx: idx,
                casts: std::mem::take(&mut buf),
                score,
            })
        }

        candidates.sort_by(|a, b| b.score.cmp(&a.score));

        candidates
    }

    /// Compare the types we have with the types we want, filling the provided
    /// buffer with the cast type.
    ///
    /// Returns the total score if everything is able to be implicitly cast,
    /// None otherwise.
    fn compare_and_fill_types(
        have: &[DataType],
        sig: &Signature,
        conf: ImplicitCastConfig,
        buf: &mut Vec<CastType>,
    ) -> Option<u32> {
        buf.clear();
        let mut total = 0;

        for (idx, have) in have.iter().enumerate() {
            let want = sig.arg_at(idx)?;

            if want == DataTypeId::Any {
                buf.push(CastType::NoCastNeeded);
                total += ANY_SCORE;
                continue;
            }

            if have.datatype_id() == want {
                buf.push(CastType::NoCastNeeded);
                total += NO_CAST_SCORE;
                continue;
            }

            let score = implicit_cast_score(have.datatype_id(), want, conf)?;
            let score = score + class_bonus(have.type_class(), want.type_class());
            buf.push(CastType::Cast { to: want, score });
            total += score;
        }

        Some(total)
    }
}

/// Same class coercions score above cross class ones.
fn class_bonus(have: TypeClass, want: TypeClass) -> u32 {
    match (have, want) {
        (a, b) if a == b => SAME_CLASS_SCORE,
        (TypeClass::Decimal, TypeClass::Approximate) => DECIMAL_TO_FLOAT_BONUS,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIGS: &[Signature] = &[
        Signature::new(&[DataTypeId::Int64, DataTypeId::Int64], DataTypeId::Int64),
        Signature::new(&[DataTypeId::Int32, DataTypeId::Int32], DataTypeId::Int32),
        Signature::new(&[DataTypeId::Float64, DataTypeId::Float64], DataTypeId::Float64),
    ];

    #[test]
    fn prefer_narrowest_same_class() {
        let candidates = CandidateSignature::find_candidates(
            &[DataType::Int16, DataType::Int16],
            SIGS,
            ImplicitCastConfig::FUNCTION,
        );
        assert_eq!(3, candidates.len());
        // Int32 overload wins.
        assert_eq!(1, candidates[0].signature_idx);
        // Float is cross class, last.
        assert_eq!(2, candidates[2].signature_idx);
    }

    #[test]
    fn exact_beats_everything() {
        let candidates = CandidateSignature::find_candidates(
            &[DataType::Int64, DataType::Int64],
            SIGS,
            ImplicitCastConfig::FUNCTION,
        );
        assert_eq!(0, candidates[0].signature_idx);
        assert_eq!(
            vec![CastType::NoCastNeeded, CastType::NoCastNeeded],
            candidates[0].casts
        );
    }

    #[test]
    fn ties_keep_registration_order() {
        const DUPS: &[Signature] = &[
            Signature::new(&[DataTypeId::Any], DataTypeId::Int32),
            Signature::new(&[DataTypeId::Any], DataTypeId::Int64),
        ];
        let candidates = CandidateSignature::find_candidates(
            &[DataType::Boolean],
            DUPS,
            ImplicitCastConfig::FUNCTION,
        );
        assert_eq!(0, candidates[0].signature_idx);
        assert_eq!(1, candidates[1].signature_idx);
    }

    #[test]
    fn no_candidates() {
        let candidates = CandidateSignature::find_candidates(
            &[DataType::Boolean, DataType::Boolean],
            SIGS,
            ImplicitCastConfig::FUNCTION,
        );
        assert!(candidates.is_empty());
    }
}
