use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Actions a peer may take on a member.
    ///
    /// Sets are additive. A missing bit denies that action.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ActionSet: u8 {
        /// The peer may receive from the local application: signals
        /// delivered to it and property pushes.
        const PROVIDE = 0x02;
        /// The peer may read or introspect.
        const OBSERVE = 0x04;
        /// The peer may call methods and set properties.
        const MODIFY = 0x08;
    }
}

impl ActionSet {
    /// Every action.
    pub const FULL: ActionSet = ActionSet::all();

    /// Whether every action in `required` is granted.
    pub fn grants(&self, required: ActionSet) -> bool {
        self.contains(required)
    }
}
