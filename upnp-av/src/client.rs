//! The reusable service-client base shared by all typed AV clients.
//!
//! One instance owns everything tied to a single service of a single
//! device: the copied [`Service`] descriptor, the parsed SCPD, the
//! supported-action set, the GENA subscription (id, renewal timer) and the
//! latest state-variable snapshot fed by events.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gena_server::{EventNotification, EventRouter};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use upnp_discovery::{Device, Service, ServiceKind};
use upnp_soap::{Action, ActionResult, HttpClient, SoapClient};
use upnp_xml::{parse_last_change, parse_property_set, ParseError, ServiceDescriptor};
use xmltree::Element;

use crate::error::UpnpError;
use crate::Result;

/// A subscription is torn down after this many consecutive failed wakes.
const MAX_RENEWAL_FAILURES: u32 = 3;

/// The name-table bundle a typed service client supplies.
///
/// `action_from_str`/`variable_from_str` reject unknown names with
/// [`UpnpError::InvalidArgument`]; the `*_name` direction only ever produces
/// the declared strings, so the mappings are bijective over their sets.
pub trait ServiceTraits: Send + Sync + 'static {
    type Action: Copy + Eq + Hash + std::fmt::Debug + Send + Sync + 'static;
    type Variable: Copy + Eq + Hash + std::fmt::Debug + Send + Sync + 'static;

    const KIND: ServiceKind;

    /// Subscription timeout requested from publishers, in seconds.
    const SUBSCRIPTION_TIMEOUT: u32 = 1801;

    /// The variable carrying the nested aggregate event document, for
    /// services that use the LastChange mechanism.
    const LAST_CHANGE: Option<Self::Variable> = None;

    fn action_from_str(name: &str) -> Result<Self::Action>;
    fn action_name(action: Self::Action) -> &'static str;
    fn variable_from_str(name: &str) -> Result<Self::Variable>;
    fn variable_name(variable: Self::Variable) -> &'static str;

    /// Hook invoked for every decoded event before it is fanned out.
    fn on_state_variable_event(
        _changed: Self::Variable,
        _variables: &HashMap<Self::Variable, String>,
    ) {
    }
}

/// Fan-out signal: one decoded event, keyed by the variable that changed.
#[derive(Debug, Clone)]
pub struct StateVariableEvent<V> {
    pub changed: V,
    pub variables: HashMap<V, String>,
}

/// Fan-out signal: the per-instance content of a LastChange document.
#[derive(Debug, Clone)]
pub struct LastChangeEvent<V> {
    pub instance_id: u32,
    pub variables: HashMap<V, String>,
}

/// Shared handles every service client needs: the SOAP dispatcher and the
/// event-receive endpoint to advertise in subscriptions.
#[derive(Clone)]
pub struct ClientContext {
    soap: SoapClient,
    router: EventRouter,
    callback_url: String,
}

impl ClientContext {
    pub fn new(soap: SoapClient, router: EventRouter, callback_url: impl Into<String>) -> Self {
        Self {
            soap,
            router,
            callback_url: callback_url.into(),
        }
    }

    /// A context without a reachable event endpoint; subscriptions will be
    /// rejected by publishers but action dispatch works normally.
    pub fn without_eventing(soap: SoapClient) -> Self {
        Self::new(soap, EventRouter::new(), "http://0.0.0.0:0/event")
    }

    pub fn soap(&self) -> &SoapClient {
        &self.soap
    }

    pub fn http(&self) -> &HttpClient {
        self.soap.http()
    }
}

struct SubscriptionState {
    sid: String,
    granted_timeout: u32,
}

/// Generic per-service client state; see the module docs.
pub struct ServiceClientBase<T: ServiceTraits> {
    context: ClientContext,
    service: Service,
    descriptor: ServiceDescriptor,
    supported_actions: HashSet<T::Action>,
    state: Arc<Mutex<HashMap<T::Variable, String>>>,
    subscription: Arc<Mutex<Option<SubscriptionState>>>,
    state_events: broadcast::Sender<StateVariableEvent<T::Variable>>,
    last_change_events: broadcast::Sender<LastChangeEvent<T::Variable>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: ServiceTraits> ServiceClientBase<T> {
    /// Bind to a device: verify it implements the service, copy the service
    /// descriptor, fetch and parse the SCPD, record the supported actions.
    pub async fn bind(context: &ClientContext, device: &Device) -> Result<Self> {
        let service = device.service(T::KIND).cloned().ok_or_else(|| {
            UpnpError::invalid_argument(format!(
                "device {} does not implement {}",
                device.udn,
                T::KIND.name()
            ))
        })?;

        let scpd = context.soap.http().get(&service.scpd_url).await?;
        let descriptor = ServiceDescriptor::parse(&scpd.body)?;

        let mut supported_actions = HashSet::new();
        for name in &descriptor.actions {
            match T::action_from_str(name) {
                Ok(action) => {
                    supported_actions.insert(action);
                }
                Err(_) => debug!(service = %T::KIND.name(), action = %name, "action outside the typed set"),
            }
        }

        let (state_events, _) = broadcast::channel(64);
        let (last_change_events, _) = broadcast::channel(64);

        Ok(Self {
            context: context.clone(),
            service,
            descriptor,
            supported_actions,
            state: Arc::new(Mutex::new(HashMap::new())),
            subscription: Arc::new(Mutex::new(None)),
            state_events,
            last_change_events,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// `true` iff the action appeared in the parsed SCPD action list.
    pub fn supports_action(&self, action: T::Action) -> bool {
        self.supported_actions.contains(&action)
    }

    pub fn service(&self) -> &Service {
        &self.service
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    /// Latest evented value of a state variable, if any event carried it.
    pub fn state_variable_value(&self, variable: T::Variable) -> Option<String> {
        self.state.lock().unwrap().get(&variable).cloned()
    }

    pub fn state_variable_events(&self) -> broadcast::Receiver<StateVariableEvent<T::Variable>> {
        self.state_events.subscribe()
    }

    pub fn last_change_events(&self) -> broadcast::Receiver<LastChangeEvent<T::Variable>> {
        self.last_change_events.subscribe()
    }

    pub fn subscription_id(&self) -> Option<String> {
        self.subscription.lock().unwrap().as_ref().map(|s| s.sid.clone())
    }

    /// Dispatch an action and return the raw result. A populated fault is
    /// surfaced as [`UpnpError::SoapFault`].
    pub async fn execute(
        &self,
        action: T::Action,
        arguments: &[(&str, String)],
    ) -> Result<ActionResult> {
        let name = T::action_name(action);
        let mut soap_action = Action::new(name, &self.service.control_url, &self.service.urn());
        for (argument, value) in arguments {
            soap_action.add_argument(argument, value.clone());
        }

        let result = self.context.soap.send(&soap_action).await?;
        if let Some(fault) = result.fault {
            return Err(UpnpError::SoapFault {
                code: fault.code,
                description: fault.description,
            });
        }
        Ok(result)
    }

    /// Dispatch an action and extract its `<u:...Response>` element.
    pub async fn execute_parsed(
        &self,
        action: T::Action,
        arguments: &[(&str, String)],
    ) -> Result<Element> {
        let name = T::action_name(action);
        let result = self.execute(action, arguments).await?;
        Ok(result.response_element(name)?)
    }

    /// Subscribe to the service's events.
    ///
    /// Registers the granted SID with the event router, starts the decode
    /// pump, and schedules a renewal at ¾ of the granted timeout. A granted
    /// timeout of 0 means the subscription is infinite and no timer runs.
    pub async fn subscribe(&self) -> Result<()> {
        if self.subscription.lock().unwrap().is_some() {
            return Err(UpnpError::invalid_state("already subscribed"));
        }

        let response = self
            .context
            .soap
            .http()
            .subscribe(
                &self.service.event_subscription_url,
                &self.context.callback_url,
                T::SUBSCRIPTION_TIMEOUT,
            )
            .await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        self.context
            .router
            .register(response.sid.clone(), sender.clone())
            .await;
        *self.subscription.lock().unwrap() = Some(SubscriptionState {
            sid: response.sid,
            granted_timeout: response.timeout_seconds,
        });

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(tokio::spawn(pump_events::<T>(
            receiver,
            self.state.clone(),
            self.state_events.clone(),
            self.last_change_events.clone(),
        )));

        if response.timeout_seconds > 0 {
            let renewal = RenewalContext {
                http: self.context.soap.http().clone(),
                router: self.context.router.clone(),
                event_url: self.service.event_subscription_url.clone(),
                callback_url: self.context.callback_url.clone(),
                requested_timeout: T::SUBSCRIPTION_TIMEOUT,
                subscription: self.subscription.clone(),
                sender,
            };
            tasks.push(tokio::spawn(renewal_loop(renewal, response.timeout_seconds)));
        }

        Ok(())
    }

    /// Cancel the renewal timer, unregister the SID and send UNSUBSCRIBE.
    /// A second call is a no-op.
    pub async fn unsubscribe(&self) -> Result<()> {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }

        let state = self.subscription.lock().unwrap().take();
        let Some(state) = state else {
            return Ok(());
        };

        self.context.router.unregister(&state.sid).await;
        self.context
            .soap
            .http()
            .unsubscribe(&self.service.event_subscription_url, &state.sid)
            .await?;
        Ok(())
    }
}

/// One decoded event: what changed, the decoded variables, and the
/// LastChange instance id when the event came from a nested document.
struct DecodedUpdate<V> {
    changed: V,
    instance_id: Option<u32>,
    variables: HashMap<V, String>,
}

/// Decode one NOTIFY body into typed updates.
///
/// Unknown variable names are logged and dropped; they never fail the
/// event.
fn decode_notification<T: ServiceTraits>(
    body: &str,
) -> std::result::Result<Vec<DecodedUpdate<T::Variable>>, ParseError> {
    let mut updates = Vec::new();

    for (name, value) in parse_property_set(body)? {
        if name == "LastChange" {
            let Some(last_change) = T::LAST_CHANGE else {
                debug!(service = %T::KIND.name(), "LastChange event for service without one");
                continue;
            };
            for instance in parse_last_change(&value)? {
                let mut variables = HashMap::new();
                for (variable, value) in instance.changes {
                    match T::variable_from_str(&variable) {
                        Ok(decoded) => {
                            variables.insert(decoded, value);
                        }
                        Err(_) => debug!(variable = %variable, "unknown state variable dropped"),
                    }
                }
                updates.push(DecodedUpdate {
                    changed: last_change,
                    instance_id: Some(instance.instance_id),
                    variables,
                });
            }
        } else {
            match T::variable_from_str(&name) {
                Ok(changed) => {
                    let mut variables = HashMap::new();
                    variables.insert(changed, value);
                    updates.push(DecodedUpdate {
                        changed,
                        instance_id: None,
                        variables,
                    });
                }
                Err(_) => debug!(variable = %name, "unknown state variable dropped"),
            }
        }
    }

    Ok(updates)
}

async fn pump_events<T: ServiceTraits>(
    mut receiver: mpsc::UnboundedReceiver<EventNotification>,
    state: Arc<Mutex<HashMap<T::Variable, String>>>,
    state_events: broadcast::Sender<StateVariableEvent<T::Variable>>,
    last_change_events: broadcast::Sender<LastChangeEvent<T::Variable>>,
) {
    while let Some(notification) = receiver.recv().await {
        let updates = match decode_notification::<T>(&notification.body) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(sid = %notification.sid, "malformed event body dropped: {e}");
                continue;
            }
        };

        for update in updates {
            {
                let mut snapshot = state.lock().unwrap();
                for (variable, value) in &update.variables {
                    snapshot.insert(*variable, value.clone());
                }
            }

            T::on_state_variable_event(update.changed, &update.variables);

            let _ = state_events.send(StateVariableEvent {
                changed: update.changed,
                variables: update.variables.clone(),
            });
            if let Some(instance_id) = update.instance_id {
                let _ = last_change_events.send(LastChangeEvent {
                    instance_id,
                    variables: update.variables,
                });
            }
        }
    }
}

struct RenewalContext {
    http: HttpClient,
    router: EventRouter,
    event_url: String,
    callback_url: String,
    requested_timeout: u32,
    subscription: Arc<Mutex<Option<SubscriptionState>>>,
    sender: mpsc::UnboundedSender<EventNotification>,
}

fn renewal_delay(granted_timeout: u32) -> Duration {
    Duration::from_secs(u64::from(granted_timeout) * 3 / 4).max(Duration::from_secs(1))
}

/// Timer-driven renewal.
///
/// Each wake renews the current subscription. A failed wake logs a warning
/// and leaves the subscription stale; the *next* wake re-runs SUBSCRIBE from
/// scratch under a fresh SID. After [`MAX_RENEWAL_FAILURES`] consecutive
/// failures the subscription is destroyed.
async fn renewal_loop(ctx: RenewalContext, initial_timeout: u32) {
    let mut granted = initial_timeout;
    let mut failures = 0u32;

    loop {
        tokio::time::sleep(renewal_delay(granted)).await;

        let Some(sid) = ctx
            .subscription
            .lock()
            .unwrap()
            .as_ref()
            .map(|s| s.sid.clone())
        else {
            return;
        };

        if failures == 0 {
            match ctx
                .http
                .renew(&ctx.event_url, &sid, ctx.requested_timeout)
                .await
            {
                Ok(response) => {
                    granted = response.timeout_seconds;
                    if let Some(state) = ctx.subscription.lock().unwrap().as_mut() {
                        state.granted_timeout = granted;
                    }
                    if granted == 0 {
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(%sid, "subscription renewal failed: {e}");
                    failures += 1;
                }
            }
        } else {
            match ctx
                .http
                .subscribe(&ctx.event_url, &ctx.callback_url, ctx.requested_timeout)
                .await
            {
                Ok(response) => {
                    ctx.router.unregister(&sid).await;
                    ctx.router
                        .register(response.sid.clone(), ctx.sender.clone())
                        .await;
                    granted = response.timeout_seconds;
                    *ctx.subscription.lock().unwrap() = Some(SubscriptionState {
                        sid: response.sid,
                        granted_timeout: granted,
                    });
                    failures = 0;
                    if granted == 0 {
                        return;
                    }
                    continue;
                }
                Err(e) => {
                    warn!(%sid, "re-subscription failed: {e}");
                    failures += 1;
                }
            }
        }

        if failures >= MAX_RENEWAL_FAILURES {
            warn!(%sid, "subscription abandoned after {failures} consecutive failures");
            ctx.subscription.lock().unwrap().take();
            ctx.router.unregister(&sid).await;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestTraits;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestAction {
        Probe,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum TestVariable {
        LastChange,
        TransportState,
        Mode,
    }

    impl ServiceTraits for TestTraits {
        type Action = TestAction;
        type Variable = TestVariable;

        const KIND: ServiceKind = ServiceKind::AVTransport;
        const LAST_CHANGE: Option<TestVariable> = Some(TestVariable::LastChange);

        fn action_from_str(name: &str) -> Result<TestAction> {
            match name {
                "Probe" => Ok(TestAction::Probe),
                other => Err(UpnpError::invalid_argument(format!("unknown action {other}"))),
            }
        }

        fn action_name(_: TestAction) -> &'static str {
            "Probe"
        }

        fn variable_from_str(name: &str) -> Result<TestVariable> {
            match name {
                "LastChange" => Ok(TestVariable::LastChange),
                "TransportState" => Ok(TestVariable::TransportState),
                "Mode" => Ok(TestVariable::Mode),
                other => Err(UpnpError::invalid_argument(format!("unknown variable {other}"))),
            }
        }

        fn variable_name(variable: TestVariable) -> &'static str {
            match variable {
                TestVariable::LastChange => "LastChange",
                TestVariable::TransportState => "TransportState",
                TestVariable::Mode => "Mode",
            }
        }
    }

    #[test]
    fn decode_last_change_event() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property><LastChange>&lt;Event&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;Unknown val="x"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property>
        </e:propertyset>"#;

        let updates = decode_notification::<TestTraits>(body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].changed, TestVariable::LastChange);
        assert_eq!(updates[0].instance_id, Some(0));
        // the unknown variable is dropped, the known one survives
        assert_eq!(updates[0].variables.len(), 1);
        assert_eq!(
            updates[0].variables.get(&TestVariable::TransportState).unwrap(),
            "PLAYING"
        );
    }

    #[test]
    fn decode_plain_property_event() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
          <e:property><Mode>shuffle</Mode></e:property>
        </e:propertyset>"#;

        let updates = decode_notification::<TestTraits>(body).unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].changed, TestVariable::Mode);
        assert_eq!(updates[0].instance_id, None);
        assert_eq!(updates[0].variables.get(&TestVariable::Mode).unwrap(), "shuffle");
    }

    #[test]
    fn decode_rejects_malformed_body() {
        assert!(decode_notification::<TestTraits>("<propertyset").is_err());
        assert!(decode_notification::<TestTraits>("<unrelated/>").is_err());
    }

    #[test]
    fn renewal_fires_at_three_quarters() {
        assert_eq!(renewal_delay(1800), Duration::from_secs(1350));
        assert_eq!(renewal_delay(4), Duration::from_secs(3));
        // tiny grants still leave a positive delay
        assert_eq!(renewal_delay(1), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn pump_updates_state_and_fans_out() {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(HashMap::new()));
        let (state_events, mut state_rx) = broadcast::channel(8);
        let (last_change_events, mut last_change_rx) = broadcast::channel(8);

        let pump = tokio::spawn(pump_events::<TestTraits>(
            receiver,
            state.clone(),
            state_events,
            last_change_events,
        ));

        sender
            .send(EventNotification {
                sid: "uuid:sub".to_string(),
                seq: 0,
                body: r#"<propertyset><property><LastChange>&lt;Event&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></property></propertyset>"#.to_string(),
            })
            .unwrap();

        let event = state_rx.recv().await.unwrap();
        assert_eq!(event.changed, TestVariable::LastChange);

        let last_change = last_change_rx.recv().await.unwrap();
        assert_eq!(last_change.instance_id, 0);
        assert_eq!(
            last_change.variables.get(&TestVariable::TransportState).unwrap(),
            "PLAYING"
        );

        assert_eq!(
            state.lock().unwrap().get(&TestVariable::TransportState).unwrap(),
            "PLAYING"
        );

        // malformed follow-up is dropped without killing the pump
        sender
            .send(EventNotification {
                sid: "uuid:sub".to_string(),
                seq: 1,
                body: "<broken".to_string(),
            })
            .unwrap();
        sender
            .send(EventNotification {
                sid: "uuid:sub".to_string(),
                seq: 2,
                body: "<propertyset><property><Mode>intro</Mode></property></propertyset>"
                    .to_string(),
            })
            .unwrap();

        let event = state_rx.recv().await.unwrap();
        assert_eq!(event.changed, TestVariable::Mode);

        pump.abort();
    }
}
