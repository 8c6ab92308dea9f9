//! Routes authorized messages to the handlers of local objects.
//!
//! Every inbound call, property access and signal is authorized against the
//! peer's [`Session`] before a handler sees it. Outbound signals go only to
//! sessions whose peers may receive them. Denials surface as
//! [`DispatchError::PermissionDenied`], which carries the
//! [`crate::PERMISSION_DENIED`] error name.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{Direction, DispatchError, Request, SecurityApplication, Session};

/// What a peer asks of a member.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Call a method with arguments.
    Call(Value),
    /// Read a property.
    Get,
    /// Write a property.
    Set(Value),
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Call(_) => "method calls",
            Operation::Get => "property reads",
            Operation::Set(_) => "property writes",
        }
    }

    /// The error a handler returns for an operation it does not support.
    pub fn unsupported(&self) -> DispatchError {
        DispatchError::Unsupported(self.name())
    }
}

/// Serves one member of a local object.
pub trait MemberHandler: Send + Sync {
    /// Perform `operation`, returning the reply body.
    ///
    /// # Errors
    ///
    /// Any [`DispatchError`], typically [`DispatchError::Handler`] or
    /// [`Operation::unsupported`].
    fn handle(&self, operation: Operation) -> Result<Value, DispatchError>;
}

impl<F> MemberHandler for F
where
    F: Fn(Operation) -> Result<Value, DispatchError> + Send + Sync,
{
    fn handle(&self, operation: Operation) -> Result<Value, DispatchError> {
        self(operation)
    }
}

/// Receives signals from authorized peers.
pub trait SignalHandler: Send + Sync {
    /// Called once per delivered signal.
    fn on_signal(&self, from: &Session, subscription: &Subscription, body: &Value);
}

impl<F> SignalHandler for F
where
    F: Fn(&Session, &Subscription, &Value) + Send + Sync,
{
    fn on_signal(&self, from: &Session, subscription: &Subscription, body: &Value) {
        self(from, subscription, body)
    }
}

type MemberKey = (String, String, String);

fn member_key(object_path: &str, interface_name: &str, member_name: &str) -> MemberKey {
    (
        object_path.to_string(),
        interface_name.to_string(),
        member_name.to_string(),
    )
}

/// Handlers of local objects, by object path, interface and member.
#[derive(Default)]
pub struct ObjectTable {
    handlers: HashMap<MemberKey, Arc<dyn MemberHandler>>,
}

impl ObjectTable {
    /// Serve `object_path` `interface_name.member_name` with `handler`,
    /// replacing any previous handler.
    pub fn register(
        &mut self,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
        handler: impl MemberHandler + 'static,
    ) {
        self.handlers.insert(
            member_key(object_path, interface_name, member_name),
            Arc::new(handler),
        );
    }

    /// Stop serving a member. Returns whether it was served.
    pub fn unregister(
        &mut self,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
    ) -> bool {
        self.handlers
            .remove(&member_key(object_path, interface_name, member_name))
            .is_some()
    }

    /// The handler of a member.
    pub fn lookup(
        &self,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
    ) -> Option<Arc<dyn MemberHandler>> {
        self.handlers
            .get(&member_key(object_path, interface_name, member_name))
            .cloned()
    }

    /// Members of `interface_name` served on `object_path`, sorted.
    pub fn members(&self, object_path: &str, interface_name: &str) -> Vec<String> {
        let mut members: Vec<String> = self
            .handlers
            .keys()
            .filter(|(path, interface, _)| path == object_path && interface == interface_name)
            .map(|(_, _, member)| member.clone())
            .collect();
        members.sort();
        members
    }
}

/// Identifies one registered signal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(usize);

/// A signal a handler listens for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription {
    /// Emitting object.
    pub object_path: String,
    /// Signal interface.
    pub interface_name: String,
    /// Signal name.
    pub member_name: String,
}

impl Subscription {
    /// Listen for `interface_name.member_name` emitted by `object_path`.
    pub fn new(
        object_path: impl Into<String>,
        interface_name: impl Into<String>,
        member_name: impl Into<String>,
    ) -> Self {
        Self {
            object_path: object_path.into(),
            interface_name: interface_name.into(),
            member_name: member_name.into(),
        }
    }
}

/// Which handlers listen for which signals.
#[derive(Default)]
pub struct SubscriptionRegistry {
    next: usize,
    handlers: BTreeMap<HandlerId, Arc<dyn SignalHandler>>,
    subscriptions: BTreeMap<HandlerId, BTreeSet<Subscription>>,
}

impl SubscriptionRegistry {
    /// Register a handler with no subscriptions yet.
    pub fn register(&mut self, handler: impl SignalHandler + 'static) -> HandlerId {
        let id = HandlerId(self.next);
        self.next += 1;
        self.handlers.insert(id, Arc::new(handler));
        self.subscriptions.insert(id, BTreeSet::new());
        id
    }

    /// Drop a handler and all of its subscriptions.
    pub fn unregister(&mut self, id: HandlerId) -> bool {
        self.subscriptions.remove(&id);
        self.handlers.remove(&id).is_some()
    }

    /// Add a subscription. Returns `false` for unknown handlers and for
    /// subscriptions the handler already holds.
    pub fn subscribe(&mut self, id: HandlerId, subscription: Subscription) -> bool {
        self.subscriptions
            .get_mut(&id)
            .is_some_and(|subscriptions| subscriptions.insert(subscription))
    }

    /// Remove a subscription. Returns whether the handler held it.
    pub fn unsubscribe(&mut self, id: HandlerId, subscription: &Subscription) -> bool {
        self.subscriptions
            .get_mut(&id)
            .is_some_and(|subscriptions| subscriptions.remove(subscription))
    }

    /// Subscriptions of a handler.
    pub fn subscriptions(&self, id: HandlerId) -> Option<&BTreeSet<Subscription>> {
        self.subscriptions.get(&id)
    }

    /// Handlers subscribed to `subscription`, in registration order.
    pub fn subscribers(&self, subscription: &Subscription) -> Vec<Arc<dyn SignalHandler>> {
        self.subscriptions
            .iter()
            .filter(|(_, subscriptions)| subscriptions.contains(subscription))
            .filter_map(|(id, _)| self.handlers.get(id).cloned())
            .collect()
    }
}

/// Authorizes messages for one [`SecurityApplication`] and routes them.
///
/// Handlers run without any dispatcher lock held, so they may register or
/// unregister handlers themselves.
pub struct Dispatcher {
    application: Arc<SecurityApplication>,
    objects: RwLock<ObjectTable>,
    signals: RwLock<SubscriptionRegistry>,
}

impl Dispatcher {
    /// A dispatcher with no handlers.
    pub fn new(application: Arc<SecurityApplication>) -> Self {
        Self {
            application,
            objects: RwLock::new(ObjectTable::default()),
            signals: RwLock::new(SubscriptionRegistry::default()),
        }
    }

    /// The application whose policy gates dispatch.
    pub fn application(&self) -> &Arc<SecurityApplication> {
        &self.application
    }

    /// Serve a member. See [`ObjectTable::register`].
    pub fn register_member(
        &self,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
        handler: impl MemberHandler + 'static,
    ) {
        self.objects
            .write()
            .register(object_path, interface_name, member_name, handler);
    }

    /// Stop serving a member.
    pub fn unregister_member(
        &self,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
    ) -> bool {
        self.objects
            .write()
            .unregister(object_path, interface_name, member_name)
    }

    /// Register a signal handler and subscribe it to `subscriptions`.
    pub fn register_signal_handler(
        &self,
        handler: impl SignalHandler + 'static,
        subscriptions: impl IntoIterator<Item = Subscription>,
    ) -> HandlerId {
        let mut registry = self.signals.write();
        let id = registry.register(handler);
        for subscription in subscriptions {
            registry.subscribe(id, subscription);
        }
        id
    }

    /// Subscribe a registered handler to one more signal.
    pub fn subscribe(&self, id: HandlerId, subscription: Subscription) -> bool {
        self.signals.write().subscribe(id, subscription)
    }

    /// Unsubscribe a handler from one signal.
    pub fn unsubscribe(&self, id: HandlerId, subscription: &Subscription) -> bool {
        self.signals.write().unsubscribe(id, subscription)
    }

    /// Drop a signal handler.
    pub fn unregister_signal_handler(&self, id: HandlerId) -> bool {
        self.signals.write().unregister(id)
    }

    /// Authorize and perform a method call from `session`'s peer.
    ///
    /// # Errors
    ///
    /// [`DispatchError::PermissionDenied`] when denied, before any handler
    /// runs. Otherwise the lookup or handler error.
    pub fn dispatch_call(
        &self,
        session: &Session,
        object_path: &str,
        interface_name: &str,
        member_name: &str,
        args: Value,
    ) -> Result<Value, DispatchError> {
        let request = Request::method_call(object_path, interface_name, member_name);
        self.route(session, &request, Operation::Call(args))
    }

    /// Authorize and perform a property read.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch_call`].
    pub fn dispatch_get(
        &self,
        session: &Session,
        object_path: &str,
        interface_name: &str,
        property: &str,
    ) -> Result<Value, DispatchError> {
        let request = Request::property_get(object_path, interface_name, property);
        self.route(session, &request, Operation::Get)
    }

    /// Authorize and perform a read of every property of an interface.
    ///
    /// Properties whose handler does not support reads are left out.
    ///
    /// # Errors
    ///
    /// [`DispatchError::PermissionDenied`] when denied, or the first handler
    /// failure.
    pub fn dispatch_get_all(
        &self,
        session: &Session,
        object_path: &str,
        interface_name: &str,
    ) -> Result<Map<String, Value>, DispatchError> {
        let request = Request::property_get_all(object_path, interface_name);
        self.authorize(session, &request)?;

        let handlers: Vec<(String, Arc<dyn MemberHandler>)> = {
            let objects = self.objects.read();
            objects
                .members(object_path, interface_name)
                .into_iter()
                .filter_map(|member| {
                    let handler = objects.lookup(object_path, interface_name, &member)?;
                    Some((member, handler))
                })
                .collect()
        };
        let mut properties = Map::new();
        for (member, handler) in handlers {
            match handler.handle(Operation::Get) {
                Ok(value) => {
                    properties.insert(member, value);
                }
                Err(DispatchError::Unsupported(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(properties)
    }

    /// Authorize and perform a property write.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch_call`].
    pub fn dispatch_set(
        &self,
        session: &Session,
        object_path: &str,
        interface_name: &str,
        property: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        let request = Request::property_set(object_path, interface_name, property);
        self.route(session, &request, Operation::Set(value))
            .map(|_| ())
    }

    /// Deliver a signal received from `session`'s peer to every subscribed
    /// handler. Returns how many handlers ran.
    ///
    /// # Errors
    ///
    /// [`DispatchError::PermissionDenied`] when the peer may not send it to
    /// us. No handler runs in that case.
    pub fn deliver_signal(
        &self,
        session: &Session,
        subscription: &Subscription,
        body: &Value,
    ) -> Result<usize, DispatchError> {
        let request = Request::signal(
            &subscription.object_path,
            &subscription.interface_name,
            &subscription.member_name,
            Direction::Inbound,
        );
        self.authorize(session, &request)?;
        let subscribers = self.signals.read().subscribers(subscription);
        for handler in &subscribers {
            handler.on_signal(session, subscription, body);
        }
        Ok(subscribers.len())
    }

    /// The sessions an outbound signal may be sent on.
    pub fn signal_recipients<'s>(
        &self,
        sessions: &'s [Session],
        subscription: &Subscription,
    ) -> Vec<&'s Session> {
        let request = Request::signal(
            &subscription.object_path,
            &subscription.interface_name,
            &subscription.member_name,
            Direction::Outbound,
        );
        sessions
            .iter()
            .filter(|session| self.application.authorize(session, &request).is_allowed())
            .collect()
    }

    fn authorize(&self, session: &Session, request: &Request<'_>) -> Result<(), DispatchError> {
        self.application
            .authorize(session, request)
            .into_result()
            .map_err(|reason| {
                warn!(
                    peer = %session.peer(),
                    path = request.object_path,
                    interface = request.interface_name,
                    member = request.member_name,
                    %reason,
                    "request denied"
                );
                DispatchError::PermissionDenied(reason)
            })
    }

    fn route(
        &self,
        session: &Session,
        request: &Request<'_>,
        operation: Operation,
    ) -> Result<Value, DispatchError> {
        self.authorize(session, request)?;
        let handler = self
            .objects
            .read()
            .lookup(request.object_path, request.interface_name, request.member_name)
            .ok_or_else(|| DispatchError::NoHandler {
                object_path: request.object_path.to_string(),
                interface_name: request.interface_name.to_string(),
                member_name: request.member_name.to_string(),
            })?;
        debug!(
            path = request.object_path,
            interface = request.interface_name,
            member = request.member_name,
            "dispatching"
        );
        handler.handle(operation)
    }
}
