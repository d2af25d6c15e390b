//! Navigation axes

use bitflags::bitflags;

bitflags! {
    /// Direction(s) a path step navigates from its context node
    ///
    /// Flags combine: `SELF | DESCENDANT` is descendant-or-self. `ROOT` moves
    /// to the context's root first; alone it selects the root, combined with
    /// other flags those apply from the root.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Axis: u16 {
        const ROOT = 1 << 0;
        const SELF = 1 << 1;
        const ANCESTOR = 1 << 2;
        const PARENT = 1 << 3;
        const CHILD = 1 << 4;
        const DESCENDANT = 1 << 5;
        /// Descendants reached through an unbroken chain of the step's type
        const NESTED = 1 << 6;
        const ATTRIBUTE = 1 << 7;
        const FOLLOWING = 1 << 8;
        const FOLLOWING_SIBLING = 1 << 9;
        const PRECEDING = 1 << 10;
        const PRECEDING_SIBLING = 1 << 11;
    }
}

const NAMES: &[(Axis, &str)] = &[
    (Axis::ROOT, "root"),
    (Axis::SELF, "self"),
    (Axis::ANCESTOR, "ancestor"),
    (Axis::PARENT, "parent"),
    (Axis::CHILD, "child"),
    (Axis::DESCENDANT, "descendant"),
    (Axis::NESTED, "nested"),
    (Axis::ATTRIBUTE, "attribute"),
    (Axis::FOLLOWING, "following"),
    (Axis::FOLLOWING_SIBLING, "following-sibling"),
    (Axis::PRECEDING, "preceding"),
    (Axis::PRECEDING_SIBLING, "preceding-sibling"),
];

impl Axis {
    /// Parse an axis name as written before `::`
    pub fn from_axis_name(name: &str) -> Option<Axis> {
        match name {
            "ancestor-or-self" => Some(Axis::ANCESTOR | Axis::SELF),
            "descendant-or-self" => Some(Axis::DESCENDANT | Axis::SELF),
            _ => NAMES.iter().find(|(_, n)| *n == name).map(|(axis, _)| *axis),
        }
    }

    /// Canonical name; combinations without a single name join with `|`
    pub fn name(self) -> String {
        if self == Axis::ANCESTOR | Axis::SELF {
            return "ancestor-or-self".to_string();
        }
        if self == Axis::DESCENDANT | Axis::SELF {
            return "descendant-or-self".to_string();
        }
        NAMES
            .iter()
            .filter(|(axis, _)| self.contains(*axis))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Axis leading back from a step's result to its context
    ///
    /// `ROOT` is dropped (it anchors the whole path, not a single step).
    /// Returns `None` for `ATTRIBUTE` and `NESTED`, which have no inverse.
    pub fn inverse(self) -> Option<Axis> {
        if self.intersects(Axis::ATTRIBUTE | Axis::NESTED) {
            return None;
        }
        const PAIRS: &[(Axis, Axis)] = &[
            (Axis::SELF, Axis::SELF),
            (Axis::ANCESTOR, Axis::DESCENDANT),
            (Axis::DESCENDANT, Axis::ANCESTOR),
            (Axis::PARENT, Axis::CHILD),
            (Axis::CHILD, Axis::PARENT),
            (Axis::FOLLOWING, Axis::PRECEDING),
            (Axis::PRECEDING, Axis::FOLLOWING),
            (Axis::FOLLOWING_SIBLING, Axis::PRECEDING_SIBLING),
            (Axis::PRECEDING_SIBLING, Axis::FOLLOWING_SIBLING),
        ];
        let mut inverse = Axis::empty();
        for (axis, opposite) in PAIRS {
            if self.contains(*axis) {
                inverse |= *opposite;
            }
        }
        Some(inverse)
    }
}
