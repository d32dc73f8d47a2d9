//! The device scanner: turns raw SSDP presence events into a validated,
//! TTL-bounded device table.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use upnp_soap::HttpClient;

use crate::device::{Device, DeviceKind};
use crate::error::DiscoveryError;
use crate::ssdp::{SsdpClient, SsdpEvent, SsdpInfo};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const REFRESH_SEARCH_MX: u32 = 5;

/// Device lifecycle signals.
///
/// `Discovered` fires exactly once per device lifetime, on the first alive
/// announcement whose description parses and validates. `Disappeared` fires
/// exactly once, on bye-bye or TTL expiry.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    Discovered(Device),
    Disappeared(Device),
}

struct TrackedDevice {
    device: Device,
    expires_at: Instant,
}

struct ScannerInner {
    http: HttpClient,
    targets: Vec<DeviceKind>,
    devices: Mutex<HashMap<String, TrackedDevice>>,
    /// UDNs with a description fetch in flight.
    pending: Mutex<HashSet<String>>,
    events: broadcast::Sender<DeviceEvent>,
}

/// Maintains the table of known devices.
///
/// The table is keyed by UDN; lookups return cloned snapshots and never
/// expose a device whose expiration deadline already passed.
pub struct DeviceScanner {
    inner: Arc<ScannerInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DeviceScanner {
    pub fn new(http: HttpClient, targets: Vec<DeviceKind>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(ScannerInner {
                http,
                targets,
                devices: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashSet::new()),
                events,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to Discovered/Disappeared signals.
    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.inner.events.subscribe()
    }

    /// Attach to an SSDP client and start tracking: consumes its presence
    /// events and runs the periodic TTL sweep.
    pub fn start(&self, ssdp: &SsdpClient) {
        let mut tasks = self.tasks.lock().unwrap();

        let inner = self.inner.clone();
        let mut receiver = ssdp.events();
        tasks.push(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(SsdpEvent::Alive(info)) => handle_alive(&inner, info),
                    Ok(SsdpEvent::ByeBye(info)) => handle_byebye(&inner, &info.udn),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "SSDP event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));

        let inner = self.inner.clone();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                sweep(&inner);
            }
        }));
    }

    /// Search for the configured device kinds.
    pub async fn refresh(&self, ssdp: &SsdpClient) -> Result<(), DiscoveryError> {
        for kind in &self.inner.targets {
            ssdp.search(kind.urn(), REFRESH_SEARCH_MX).await?;
        }
        Ok(())
    }

    /// Snapshot of one device. Expired devices are unreachable.
    pub fn device(&self, udn: &str) -> Option<Device> {
        let devices = self.inner.devices.lock().unwrap();
        devices
            .get(udn)
            .filter(|t| t.expires_at > Instant::now())
            .map(|t| t.device.clone())
    }

    /// Snapshots of all live devices.
    pub fn devices(&self) -> Vec<Device> {
        let now = Instant::now();
        let devices = self.inner.devices.lock().unwrap();
        devices
            .values()
            .filter(|t| t.expires_at > now)
            .map(|t| t.device.clone())
            .collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices().len()
    }

    /// Stop the background tasks. The device table stays intact so a
    /// subsequent [`start`](Self::start) resumes from known state.
    pub fn stop(&self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

fn handle_alive(inner: &Arc<ScannerInner>, info: SsdpInfo) {
    let Some(kind) = info.device_type.as_deref().and_then(DeviceKind::from_urn) else {
        return;
    };
    if !inner.targets.contains(&kind) {
        return;
    }

    let expires_at = Instant::now() + Duration::from_secs(u64::from(info.expiration_seconds));

    {
        let mut devices = inner.devices.lock().unwrap();
        if let Some(tracked) = devices.get_mut(&info.udn) {
            if tracked.device.location == info.location {
                tracked.expires_at = expires_at;
                return;
            }
            debug!(udn = %info.udn, "device location changed, re-describing");
        }
    }

    // coalesce concurrent fetches for the same device
    if !inner.pending.lock().unwrap().insert(info.udn.clone()) {
        return;
    }

    let inner = inner.clone();
    tokio::spawn(async move {
        let udn = info.udn.clone();
        describe(&inner, info, expires_at).await;
        inner.pending.lock().unwrap().remove(&udn);
    });
}

/// Fetch, parse and validate a device description, then record the device.
///
/// Emits `Discovered` only when the UDN was previously unknown; a
/// re-description after a location change swaps the entry silently.
/// Fetch and validation failures discard the device without surfacing an
/// error to the caller.
async fn describe(inner: &ScannerInner, info: SsdpInfo, expires_at: Instant) {
    let body = match inner.http.get(&info.location).await {
        Ok(response) => response.body,
        Err(e) => {
            debug!(udn = %info.udn, location = %info.location, "description fetch failed: {e}");
            return;
        }
    };

    let device = match Device::from_description(&body, &info.location, &inner.targets) {
        Ok(Some(device)) => device,
        Ok(None) => return,
        Err(e) => {
            debug!(udn = %info.udn, "description rejected: {e}");
            return;
        }
    };

    let previous = {
        let mut devices = inner.devices.lock().unwrap();
        devices.insert(
            device.udn.clone(),
            TrackedDevice {
                device: device.clone(),
                expires_at,
            },
        )
    };

    if previous.is_none() {
        info!(udn = %device.udn, name = %device.friendly_name, kind = %device.kind, "device discovered");
        let _ = inner.events.send(DeviceEvent::Discovered(device));
    }
}

fn handle_byebye(inner: &ScannerInner, udn: &str) {
    let removed = inner.devices.lock().unwrap().remove(udn);
    if let Some(tracked) = removed {
        info!(udn = %udn, "device said goodbye");
        let _ = inner.events.send(DeviceEvent::Disappeared(tracked.device));
    }
}

fn sweep(inner: &ScannerInner) {
    let now = Instant::now();
    let expired: Vec<TrackedDevice> = {
        let mut devices = inner.devices.lock().unwrap();
        let udns: Vec<String> = devices
            .iter()
            .filter(|(_, t)| t.expires_at <= now)
            .map(|(udn, _)| udn.clone())
            .collect();
        udns.into_iter().filter_map(|udn| devices.remove(&udn)).collect()
    };

    for tracked in expired {
        info!(udn = %tracked.device.udn, "device timed out");
        let _ = inner.events.send(DeviceEvent::Disappeared(tracked.device));
    }
}
