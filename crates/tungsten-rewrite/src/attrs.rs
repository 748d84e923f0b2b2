bitflags::bitflags! {
    /// Per-symbol evaluation attributes. Stored as a bitset on the
    /// symbol's [`Definition`](crate::defs::Definition) and consulted by
    /// both the matcher (Orderless/Flat/OneIdentity matching) and the
    /// evaluator (hold semantics, normalization, listability).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Attributes: u32 {
        const FLAT              = 1 << 0;
        const ORDERLESS         = 1 << 1;
        const ONE_IDENTITY      = 1 << 2;
        const LISTABLE          = 1 << 3;
        const HOLD_FIRST        = 1 << 4;
        const HOLD_REST         = 1 << 5;
        const HOLD_ALL          = 1 << 6;
        const HOLD_ALL_COMPLETE = 1 << 7;
        const NUMERIC_FUNCTION  = 1 << 8;
        const PROTECTED         = 1 << 9;
        const READ_PROTECTED    = 1 << 10;
        const LOCKED            = 1 << 11;
        const SEQUENCE_HOLD     = 1 << 12;
        const CONSTANT          = 1 << 13;
    }
}

impl Default for Attributes {
    fn default() -> Self {
        Attributes::empty()
    }
}

// The attribute bitset travels inside serialized definitions as its raw
// bits; the symbolic names are a display concern.
impl serde::Serialize for Attributes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> serde::Deserialize<'de> for Attributes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = <u32 as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Attributes::from_bits_truncate(bits))
    }
}

impl Attributes {
    /// Attribute named in user-facing forms like `SetAttributes[s, Flat]`.
    pub fn from_symbol_name(name: &str) -> Option<Attributes> {
        Some(match name {
            "Flat" => Attributes::FLAT,
            "Orderless" => Attributes::ORDERLESS,
            "OneIdentity" => Attributes::ONE_IDENTITY,
            "Listable" => Attributes::LISTABLE,
            "HoldFirst" => Attributes::HOLD_FIRST,
            "HoldRest" => Attributes::HOLD_REST,
            "HoldAll" => Attributes::HOLD_ALL,
            "HoldAllComplete" => Attributes::HOLD_ALL_COMPLETE,
            "NumericFunction" => Attributes::NUMERIC_FUNCTION,
            "Protected" => Attributes::PROTECTED,
            "ReadProtected" => Attributes::READ_PROTECTED,
            "Locked" => Attributes::LOCKED,
            "SequenceHold" => Attributes::SEQUENCE_HOLD,
            "Constant" => Attributes::CONSTANT,
            _ => return None,
        })
    }

    /// The names of every set flag, in declaration order.
    pub fn names(&self) -> Vec<&'static str> {
        const ALL: &[(Attributes, &str)] = &[
            (Attributes::CONSTANT, "Constant"),
            (Attributes::FLAT, "Flat"),
            (Attributes::HOLD_ALL, "HoldAll"),
            (Attributes::HOLD_ALL_COMPLETE, "HoldAllComplete"),
            (Attributes::HOLD_FIRST, "HoldFirst"),
            (Attributes::HOLD_REST, "HoldRest"),
            (Attributes::LISTABLE, "Listable"),
            (Attributes::LOCKED, "Locked"),
            (Attributes::NUMERIC_FUNCTION, "NumericFunction"),
            (Attributes::ONE_IDENTITY, "OneIdentity"),
            (Attributes::ORDERLESS, "Orderless"),
            (Attributes::PROTECTED, "Protected"),
            (Attributes::READ_PROTECTED, "ReadProtected"),
            (Attributes::SEQUENCE_HOLD, "SequenceHold"),
        ];
        ALL.iter()
            .filter(|(a, _)| self.contains(*a))
            .map(|(_, n)| *n)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_names() {
        let attrs = Attributes::FLAT | Attributes::ORDERLESS | Attributes::PROTECTED;
        assert_eq!(attrs.names(), vec!["Flat", "Orderless", "Protected"]);
        for name in attrs.names() {
            assert!(attrs.contains(Attributes::from_symbol_name(name).unwrap()));
        }
    }

    #[test]
    fn deserializes_from_raw_bits() {
        use serde::de::IntoDeserializer;
        let attrs = Attributes::FLAT | Attributes::LOCKED;
        let de: serde::de::value::U32Deserializer<serde::de::value::Error> =
            attrs.bits().into_deserializer();
        let back: Attributes = serde::Deserialize::deserialize(de).unwrap();
        assert_eq!(back, attrs);
    }

    #[test]
    fn unknown_name_is_none() {
        assert_eq!(Attributes::from_symbol_name("Sideways"), None);
    }
}
