use warden_policy::{ActionSet, MemberKind, Target};

/// Which way a message travels relative to the local application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sent by the peer to the local application.
    Inbound,
    /// Sent by the local application to the peer.
    Outbound,
}

/// The kind of message being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A method call.
    MethodCall,
    /// A signal.
    Signal,
    /// A property read.
    PropertyGet,
    /// A read of every property of an interface.
    PropertyGetAll,
    /// A property write.
    PropertySet,
}

impl MessageKind {
    /// The member kind policies are matched against.
    pub fn member_kind(&self) -> MemberKind {
        match self {
            MessageKind::MethodCall => MemberKind::MethodCall,
            MessageKind::Signal => MemberKind::Signal,
            MessageKind::PropertyGet | MessageKind::PropertyGetAll | MessageKind::PropertySet => {
                MemberKind::Property
            }
        }
    }
}

/// One message to authorize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request<'a> {
    /// Object path of the message.
    pub object_path: &'a str,
    /// Interface of the member. For property messages this is the
    /// property's interface, not the properties interface.
    pub interface_name: &'a str,
    /// Member name. Empty for [`MessageKind::PropertyGetAll`].
    pub member_name: &'a str,
    /// Kind of message.
    pub kind: MessageKind,
    /// Direction of travel.
    pub direction: Direction,
}

impl<'a> Request<'a> {
    /// An inbound method call.
    pub fn method_call(object_path: &'a str, interface_name: &'a str, member: &'a str) -> Self {
        Self {
            object_path,
            interface_name,
            member_name: member,
            kind: MessageKind::MethodCall,
            direction: Direction::Inbound,
        }
    }

    /// A signal travelling in `direction`.
    pub fn signal(
        object_path: &'a str,
        interface_name: &'a str,
        member: &'a str,
        direction: Direction,
    ) -> Self {
        Self {
            object_path,
            interface_name,
            member_name: member,
            kind: MessageKind::Signal,
            direction,
        }
    }

    /// An inbound property read.
    pub fn property_get(object_path: &'a str, interface_name: &'a str, property: &'a str) -> Self {
        Self {
            object_path,
            interface_name,
            member_name: property,
            kind: MessageKind::PropertyGet,
            direction: Direction::Inbound,
        }
    }

    /// An inbound read of every property of an interface.
    pub fn property_get_all(object_path: &'a str, interface_name: &'a str) -> Self {
        Self {
            object_path,
            interface_name,
            member_name: "",
            kind: MessageKind::PropertyGetAll,
            direction: Direction::Inbound,
        }
    }

    /// An inbound property write.
    pub fn property_set(object_path: &'a str, interface_name: &'a str, property: &'a str) -> Self {
        Self {
            object_path,
            interface_name,
            member_name: property,
            kind: MessageKind::PropertySet,
            direction: Direction::Inbound,
        }
    }

    /// The action the peer must hold for this message.
    ///
    /// Calls and property writes need `MODIFY`, reads need `OBSERVE`.
    /// Signals need `PROVIDE` to send and `OBSERVE` to receive.
    pub fn required_action(&self) -> ActionSet {
        match (self.kind, self.direction) {
            (MessageKind::MethodCall | MessageKind::PropertySet, _) => ActionSet::MODIFY,
            (MessageKind::PropertyGet | MessageKind::PropertyGetAll, _) => ActionSet::OBSERVE,
            (MessageKind::Signal, Direction::Outbound) => ActionSet::PROVIDE,
            (MessageKind::Signal, Direction::Inbound) => ActionSet::OBSERVE,
        }
    }

    /// The policy target of this message.
    pub fn target(&self) -> Target<'a> {
        Target::new(
            self.object_path,
            self.interface_name,
            self.member_name,
            self.kind.member_kind(),
        )
    }
}
