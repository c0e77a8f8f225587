use std::fmt;

/// Operation kind of a mutation. Kinds are bits so hooks can match a set
/// of them at once (`Op::UPDATE | Op::UPDATE_ONE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Op(u8);

impl Op {
    pub const CREATE: Op = Op(1);
    pub const UPDATE: Op = Op(1 << 1);
    pub const UPDATE_ONE: Op = Op(1 << 2);
    pub const DELETE: Op = Op(1 << 3);
    pub const DELETE_ONE: Op = Op(1 << 4);

    /// Whether this kind is one of the kinds in `mask`.
    pub fn is(self, mask: Op) -> bool {
        self.0 & mask.0 != 0
    }

    pub fn is_update(self) -> bool {
        self.is(Op::UPDATE | Op::UPDATE_ONE)
    }

    pub fn is_delete(self) -> bool {
        self.is(Op::DELETE | Op::DELETE_ONE)
    }
}

impl std::ops::BitOr for Op {
    type Output = Op;

    fn bitor(self, rhs: Op) -> Op {
        Op(self.0 | rhs.0)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Op::CREATE, "Create"),
            (Op::UPDATE, "Update"),
            (Op::UPDATE_ONE, "UpdateOne"),
            (Op::DELETE, "Delete"),
            (Op::DELETE_ONE, "DeleteOne"),
        ];
        let parts: Vec<&str> = names
            .iter()
            .filter(|(op, _)| self.is(*op))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&parts.join("|"))
    }
}
