/// Mode of a single lock request.
///
/// Tables take any of the first five; records only `Shared`/`Exclusive`;
/// index gaps only `Gap`, which lives in its own resource namespace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
    IntentionShared,
    IntentionExclusive,
    SharedIntentionExclusive,
    Gap,
}

impl LockMode {
    /// Whether two granted requests in these modes may coexist on one
    /// resource. Symmetric.
    pub fn compatible_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match self {
            IntentionShared => !matches!(other, Exclusive | Gap),
            IntentionExclusive => matches!(other, IntentionShared | IntentionExclusive),
            Shared => matches!(other, IntentionShared | Shared),
            SharedIntentionExclusive => matches!(other, IntentionShared),
            Exclusive => false,
            // Gap marks never conflict with each other; they are kept on
            // separate resources from every other mode.
            Gap => matches!(other, Gap),
        }
    }

    /// Whether a hold in `self` already satisfies a request for `other`.
    ///
    /// The partial order is IS ≤ S ≤ SIX ≤ X and IS ≤ IX ≤ SIX.
    pub fn covers(self, other: LockMode) -> bool {
        use LockMode::*;
        match self {
            Exclusive => !matches!(other, Gap),
            SharedIntentionExclusive => !matches!(other, Exclusive | Gap),
            Shared => matches!(other, Shared | IntentionShared),
            IntentionExclusive => matches!(other, IntentionExclusive | IntentionShared),
            IntentionShared => matches!(other, IntentionShared),
            Gap => matches!(other, Gap),
        }
    }

    /// Least upper bound of two modes: the mode an in-place upgrade must
    /// reach so that the hold satisfies both.
    pub fn lub(self, other: LockMode) -> LockMode {
        use LockMode::*;
        if self.covers(other) {
            return self;
        }
        if other.covers(self) {
            return other;
        }
        match (self, other) {
            (Shared, IntentionExclusive) | (IntentionExclusive, Shared) => {
                SharedIntentionExclusive
            }
            // Every other pair is ordered, and Gap never mixes with the
            // table/record modes.
            _ => unreachable!("no upper bound for {:?} and {:?}", self, other),
        }
    }
}

/// Aggregate mode of all currently granted requests in one queue: the
/// single most restrictive mode present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum GroupLockMode {
    #[default]
    NonLock,
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
    Gap,
}

impl GroupLockMode {
    /// The group mode a single granted request in `mode` contributes.
    pub fn of(mode: LockMode) -> GroupLockMode {
        match mode {
            LockMode::Shared => GroupLockMode::Shared,
            LockMode::Exclusive => GroupLockMode::Exclusive,
            LockMode::IntentionShared => GroupLockMode::IntentionShared,
            LockMode::IntentionExclusive => GroupLockMode::IntentionExclusive,
            LockMode::SharedIntentionExclusive => GroupLockMode::SharedIntentionExclusive,
            LockMode::Gap => GroupLockMode::Gap,
        }
    }

    /// Whether a new request in `mode` is compatible with everything this
    /// group mode summarises.
    pub fn admits(self, mode: LockMode) -> bool {
        match self.defining_mode() {
            None => true,
            Some(held) => held.compatible_with(mode),
        }
    }

    fn defining_mode(self) -> Option<LockMode> {
        match self {
            GroupLockMode::NonLock => None,
            GroupLockMode::Shared => Some(LockMode::Shared),
            GroupLockMode::Exclusive => Some(LockMode::Exclusive),
            GroupLockMode::IntentionShared => Some(LockMode::IntentionShared),
            GroupLockMode::IntentionExclusive => Some(LockMode::IntentionExclusive),
            GroupLockMode::SharedIntentionExclusive => {
                Some(LockMode::SharedIntentionExclusive)
            }
            GroupLockMode::Gap => Some(LockMode::Gap),
        }
    }
}
