use serde::{Deserialize, Serialize};

use crate::{ActionSet, Glob, PolicyError};

/// Kind of interface member.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// Any kind. As a rule kind it matches every member; as a target kind
    /// it only matches rules that do not name a kind.
    #[default]
    NotSpecified,
    /// A method.
    MethodCall,
    /// A signal.
    Signal,
    /// A property.
    Property,
}

impl MemberKind {
    /// Whether a member rule of this kind covers a member of kind `target`.
    pub fn covers(&self, target: MemberKind) -> bool {
        *self == MemberKind::NotSpecified || *self == target
    }

    /// Actions that mean something for a member of this kind. A method
    /// cannot be observed and a signal cannot be modified.
    pub fn valid_actions(&self) -> ActionSet {
        match self {
            MemberKind::NotSpecified | MemberKind::Property => ActionSet::FULL,
            MemberKind::MethodCall => ActionSet::PROVIDE | ActionSet::MODIFY,
            MemberKind::Signal => ActionSet::OBSERVE | ActionSet::PROVIDE,
        }
    }
}

/// The member a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target<'a> {
    /// Object path, e.g. `/org/example/chat`.
    pub object_path: &'a str,
    /// Interface name, e.g. `org.example.Chat`.
    pub interface_name: &'a str,
    /// Member name, e.g. `Send`.
    pub member_name: &'a str,
    /// Kind of the member.
    pub kind: MemberKind,
}

impl<'a> Target<'a> {
    /// Create a target.
    pub fn new(
        object_path: &'a str,
        interface_name: &'a str,
        member_name: &'a str,
        kind: MemberKind,
    ) -> Self {
        Self {
            object_path,
            interface_name,
            member_name,
            kind,
        }
    }
}

/// Actions granted on the members whose name matches a glob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberRule {
    /// Member name pattern.
    pub name: Glob,
    /// Kind of member covered.
    pub kind: MemberKind,
    /// Granted actions.
    pub actions: ActionSet,
}

impl MemberRule {
    /// Create a member rule.
    pub fn new(name: Glob, kind: MemberKind, actions: ActionSet) -> Self {
        Self {
            name,
            kind,
            actions,
        }
    }

    /// A rule granting `actions` on every member of every kind.
    pub fn any(actions: ActionSet) -> Self {
        Self::new(Glob::any(), MemberKind::NotSpecified, actions)
    }

    fn covers(&self, target: &Target<'_>) -> bool {
        self.kind.covers(target.kind) && self.name.matches(target.member_name)
    }
}

/// Member rules for the interfaces and objects matching two globs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Object path pattern.
    pub object_path: Glob,
    /// Interface name pattern.
    pub interface_name: Glob,
    /// Member rules, all of which apply.
    pub members: Vec<MemberRule>,
}

impl Rule {
    /// A rule with no members yet.
    pub fn new(object_path: Glob, interface_name: Glob) -> Self {
        Self {
            object_path,
            interface_name,
            members: Vec::new(),
        }
    }

    /// A rule granting `actions` on every member of every object.
    pub fn everything(actions: ActionSet) -> Self {
        Self::new(Glob::any(), Glob::any()).with_member(MemberRule::any(actions))
    }

    /// Add a member rule.
    pub fn with_member(mut self, member: MemberRule) -> Self {
        self.members.push(member);
        self
    }

    /// Union of the actions this rule grants on `target`.
    pub fn actions_for(&self, target: &Target<'_>) -> ActionSet {
        if !self.object_path.matches(target.object_path)
            || !self.interface_name.matches(target.interface_name)
        {
            return ActionSet::empty();
        }
        self.members
            .iter()
            .filter(|member| member.covers(target))
            .fold(ActionSet::empty(), |granted, member| granted | member.actions)
    }
}

/// Union of the actions a list of rules grants on `target`.
pub fn actions_for(rules: &[Rule], target: &Target<'_>) -> ActionSet {
    rules
        .iter()
        .fold(ActionSet::empty(), |granted, rule| granted | rule.actions_for(target))
}

pub(crate) fn check_rules(rules: &[Rule]) -> Result<(), PolicyError> {
    for rule in rules {
        if rule.members.is_empty() {
            return Err(PolicyError::NoMembers {
                interface_name: rule.interface_name.to_string(),
            });
        }
        for member in &rule.members {
            let unknown = member.actions.bits() & !ActionSet::all().bits();
            if unknown != 0 {
                return Err(PolicyError::UnknownActions {
                    member: member.name.to_string(),
                    bits: unknown,
                });
            }
            if !member.kind.valid_actions().contains(member.actions) {
                return Err(PolicyError::InvalidMemberActions {
                    member: member.name.to_string(),
                    kind: member.kind,
                    actions: member.actions,
                });
            }
        }
    }
    Ok(())
}
