// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Salvage: carrying an old argument forward into a (possibly different)
//! slot when a record is rebound.
use crate::farg::{FargType, Slot};
use crate::lexicon;
use crate::timestamp::TimeStamp;

use super::{DataValue, Payload};

impl DataValue {
    /// Best-effort conversion of `old` into a fresh value for `slot`.
    ///
    /// Falls back to the slot default whenever `old` is unbound or no
    /// type-preserving conversion exists. The result never carries an
    /// identity, nested records included.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn salvage_for(slot: &Slot, old: &Self) -> Self {
        if !old.farg_id.is_valid() {
            return slot.construct_empty_arg();
        }
        let carried = match (slot.farg_type(), &old.payload) {
            (FargType::Integer, Payload::Int(v)) => Some(Payload::Int(*v)),
            (FargType::Integer, Payload::Float(v)) => Some(Payload::Int(v.trunc() as i64)),
            (FargType::Float, Payload::Float(v)) => Some(Payload::Float(*v)),
            (FargType::Float, Payload::Int(v)) => Some(Payload::Float(*v as f64)),
            (FargType::Nominal, Payload::Nominal(v)) => Some(Payload::Nominal(v.clone())),
            (FargType::Nominal, Payload::QuoteString(Some(v)) | Payload::Text(Some(v)))
                if lexicon::is_valid_nominal(v) =>
            {
                Some(Payload::Nominal(Some(v.clone())))
            }
            (FargType::QuoteString, Payload::QuoteString(v) | Payload::Nominal(v)) => {
                Some(Payload::QuoteString(v.clone()))
            }
            (FargType::QuoteString, Payload::Text(v))
                if v.as_deref().is_none_or(lexicon::is_valid_quote_string) =>
            {
                Some(Payload::QuoteString(v.clone()))
            }
            (FargType::Text, Payload::QuoteString(v) | Payload::Nominal(v)) => {
                Some(Payload::Text(v.clone()))
            }
            (FargType::TimeStamp, Payload::TimeStamp(ts)) if ts.is_valid() => {
                Some(Payload::TimeStamp(*ts))
            }
            (FargType::TimeStamp, Payload::Int(ticks)) => TimeStamp::new(slot.tps(), *ticks)
                .ok()
                .map(Payload::TimeStamp),
            (FargType::Predicate, Payload::Predicate(_))
            | (FargType::ColPredicate, Payload::ColPredicate(_)) => Some(old.payload.copy_blind()),
            (FargType::Untyped, Payload::Text(v)) => {
                if v.as_deref().is_none_or(lexicon::is_valid_quote_string) {
                    Some(Payload::QuoteString(v.clone()))
                } else {
                    Some(Payload::Undefined(slot.name().to_owned()))
                }
            }
            (FargType::Untyped, Payload::Undefined(_)) => {
                Some(Payload::Undefined(slot.name().to_owned()))
            }
            (FargType::Untyped, payload) => Some(payload.copy_blind()),
            _ => None,
        };
        let Some(payload) = carried else {
            return slot.construct_empty_arg();
        };
        let mut fresh = Self::unbound(payload);
        fresh.clear_id();
        match fresh.bind(slot) {
            Ok(()) => fresh,
            Err(_) => slot.construct_empty_arg(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::farg::SlotRange;
    use crate::ident::ElementId;
    use crate::index::DbIndex;
    use crate::value::ValueKind;
    use crate::vocab::{MatrixType, MatrixVocabElement, SchemaAuthority, VocabList};

    fn slots(list: Vec<Slot>) -> (VocabList, Vec<Slot>) {
        let mut idx = DbIndex::new();
        let mut vocab = VocabList::new(60);
        let mut mve = MatrixVocabElement::new("m", MatrixType::Matrix);
        for slot in list {
            mve = mve.with_slot(slot);
        }
        let id = vocab.add_matrix(&mut idx, mve).unwrap();
        let fargs = vocab.matrix(id).unwrap().fargs().to_vec();
        (vocab, fargs)
    }

    fn bound(slot: &Slot, mut dv: DataValue) -> DataValue {
        dv.bind(slot).unwrap();
        dv
    }

    #[test]
    fn unbound_source_yields_default() {
        let (_, s) = slots(vec![Slot::integer("<i>")]);
        let dv = s[0].construct_arg_with_salvage(&DataValue::int(9));
        assert_eq!(dv.to_string(), "0");
    }

    #[test]
    fn numeric_conversions() {
        let (_, s) = slots(vec![Slot::integer("<i>"), Slot::float("<f>")]);
        let f = bound(&s[1], DataValue::float(-7.9));
        let as_int = s[0].construct_arg_with_salvage(&f);
        assert_eq!(as_int.to_string(), "-7");
        let i = bound(&s[0], DataValue::int(3));
        let as_float = s[1].construct_arg_with_salvage(&i);
        assert_eq!(as_float.to_string(), "3.0");
        assert_eq!(as_float.id(), ElementId::INVALID);
    }

    #[test]
    fn strings_cross_over_when_lexically_valid() {
        let (_, s) = slots(vec![
            Slot::nominal("<n>"),
            Slot::quote_string("<q>"),
            Slot::untyped("<u>"),
        ]);
        let q = bound(&s[1], DataValue::quote_string("two words").unwrap());
        assert_eq!(s[0].construct_arg_with_salvage(&q).to_string(), "two words");
        let q = bound(&s[1], DataValue::quote_string("a, b").unwrap());
        assert_eq!(s[0].construct_arg_with_salvage(&q).to_string(), "");
        let n = bound(&s[0], DataValue::nominal("x").unwrap());
        assert_eq!(s[1].construct_arg_with_salvage(&n).to_string(), "\"x\"");
        let u = bound(&s[2], DataValue::undefined("<old>").unwrap());
        let renamed = s[2].construct_arg_with_salvage(&u);
        assert_eq!(renamed.kind(), ValueKind::Undefined);
        assert_eq!(renamed.to_string(), "<u>");
    }

    #[test]
    fn salvage_respects_target_subrange() {
        let (vocab, s) = slots(vec![Slot::integer("<i>"), Slot::integer("<j>")]);
        let mut narrow = vocab.slot(s[1].id()).unwrap().clone();
        narrow.set_range(SlotRange::Integer {
            bounds: Some((0, 5)),
        });
        let i = bound(&s[0], DataValue::int(99));
        assert_eq!(narrow.construct_arg_with_salvage(&i).to_string(), "5");
    }
}
