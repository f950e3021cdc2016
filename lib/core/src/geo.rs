//! Geo resolution
//!
//! An external geocoder (optional, bounded by a timeout) is tried for
//! street-level addresses. Otherwise, or when it fails, the record gets the
//! centroid of the most specific resolved hierarchy node that has one.
//!
//! Geocoder calls run on a fixed pool of worker threads fed through a
//! bounded queue. A hung geocoder can tie up at most the pool; once the
//! queue is full, further calls are turned away and fall back at once.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use crate::error::GeocodeError;
use crate::hierarchy::{HierarchyLevel, HierarchySnapshot, NodeIdx};
use crate::record::{ComponentKind, Coordinate, Degradation, ParsedComponents};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTier {
    /// Street or building level coordinate from the geocoder
    Exact,
    NeighborhoodCentroid,
    DistrictCentroid,
    ProvinceCentroid,
    #[default]
    Unresolved,
}

impl ResolutionTier {
    pub fn score(self) -> f64 {
        match self {
            ResolutionTier::Exact => 1.0,
            ResolutionTier::NeighborhoodCentroid => 0.8,
            ResolutionTier::DistrictCentroid => 0.6,
            ResolutionTier::ProvinceCentroid => 0.3,
            ResolutionTier::Unresolved => 0.0,
        }
    }

    pub fn for_level(level: HierarchyLevel) -> Self {
        match level {
            HierarchyLevel::Province => ResolutionTier::ProvinceCentroid,
            HierarchyLevel::District => ResolutionTier::DistrictCentroid,
            HierarchyLevel::Neighborhood => ResolutionTier::NeighborhoodCentroid,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionTier::Exact => "exact",
            ResolutionTier::NeighborhoodCentroid => "neighborhood_centroid",
            ResolutionTier::DistrictCentroid => "district_centroid",
            ResolutionTier::ProvinceCentroid => "province_centroid",
            ResolutionTier::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the geocoder is asked to locate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeQuery {
    pub components: ParsedComponents,
    pub text: String,
}

/// External street-level geocoding service.
///
/// `Ok(None)` means the service has no answer; the resolver then falls back
/// to centroids without recording a degradation.
pub trait Geocoder: Send + Sync {
    fn geocode(&self, query: &GeocodeQuery) -> Result<Option<Coordinate>, GeocodeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoResolution {
    pub coordinate: Option<Coordinate>,
    pub tier: ResolutionTier,
    pub degradations: Vec<Degradation>,
}

type GeocodeResult = Result<Option<Coordinate>, GeocodeError>;

struct GeocodeJob {
    query: GeocodeQuery,
    reply: Sender<GeocodeResult>,
}

/// Worker threads sharing one bounded job queue
struct GeocoderPool {
    jobs: SyncSender<GeocodeJob>,
    workers: usize,
    queue: usize,
}

impl GeocoderPool {
    fn start(geocoder: Arc<dyn Geocoder>, workers: usize, queue: usize) -> Self {
        let (jobs, rx) = mpsc::sync_channel::<GeocodeJob>(queue);
        let rx: Arc<Mutex<Receiver<GeocodeJob>>> = Arc::new(Mutex::new(rx));

        let mut started = 0;
        for n in 0..workers {
            let rx = Arc::clone(&rx);
            let geocoder = Arc::clone(&geocoder);
            let spawned = thread::Builder::new()
                .name(format!("adresx-geocode-{}", n))
                .spawn(move || loop {
                    // Exits once the resolver, and with it the sender, is gone
                    let Ok(job) = rx.lock().recv() else {
                        break;
                    };
                    // The caller may have stopped waiting
                    let _ = job.reply.send(geocoder.geocode(&job.query));
                });
            match spawned {
                Ok(_) => started += 1,
                Err(e) => tracing::warn!(worker = n, error = %e, "failed to start geocoder worker"),
            }
        }
        tracing::debug!(workers = started, queue, "geocoder pool started");

        Self {
            jobs,
            workers: started,
            queue,
        }
    }

    fn submit(&self, query: GeocodeQuery) -> Result<Receiver<GeocodeResult>, GeocodeError> {
        let (reply, rx) = mpsc::channel();
        match self.jobs.try_send(GeocodeJob { query, reply }) {
            Ok(()) => Ok(rx),
            Err(TrySendError::Full(_)) => Err(GeocodeError::Busy {
                workers: self.workers,
                queued: self.queue,
            }),
            Err(TrySendError::Disconnected(_)) => Err(GeocodeError::Unavailable(
                "no geocoder workers running".to_string(),
            )),
        }
    }
}

pub struct GeoResolver {
    geocoder: Option<Arc<dyn Geocoder>>,
    timeout: Duration,
    workers: usize,
    queue: usize,
    /// Started on the first geocoder call
    pool: OnceLock<GeocoderPool>,
}

impl GeoResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            geocoder: None,
            timeout,
            workers: 4,
            queue: 16,
            pool: OnceLock::new(),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self.pool = OnceLock::new();
        self
    }

    /// Worker threads and queued calls allowed for the geocoder. Zero is
    /// raised to one.
    pub fn with_limits(mut self, workers: usize, queue: usize) -> Self {
        self.workers = workers.max(1);
        self.queue = queue.max(1);
        self.pool = OnceLock::new();
        self
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    pub fn resolve(
        &self,
        components: &ParsedComponents,
        text: &str,
        resolved: Option<NodeIdx>,
        hierarchy: &HierarchySnapshot,
    ) -> GeoResolution {
        let mut degradations = Vec::new();

        let street_level = components.contains(ComponentKind::Street)
            || components.contains(ComponentKind::BuildingNumber);
        if let (Some(geocoder), true) = (&self.geocoder, street_level) {
            let query = GeocodeQuery {
                components: components.clone(),
                text: text.to_string(),
            };
            match self.call_with_timeout(geocoder, query) {
                Ok(Some(point)) => match check_point(point, resolved, hierarchy) {
                    Ok(()) => {
                        return GeoResolution {
                            coordinate: Some(point),
                            tier: ResolutionTier::Exact,
                            degradations,
                        }
                    }
                    Err(degradation) => degradations.push(degradation),
                },
                Ok(None) => {}
                Err(GeocodeError::Timeout(ms)) => {
                    tracing::warn!(timeout_ms = ms, "geocoder timed out, using centroid");
                    degradations.push(Degradation::GeoResolutionTimeout { timeout_ms: ms });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "geocoder failed, using centroid");
                    degradations.push(Degradation::GeocoderFailure { message: e.to_string() });
                }
            }
        }

        let centroid = resolved
            .and_then(|idx| hierarchy.find_up(idx, |n| n.centroid.is_some()))
            .map(|idx| hierarchy.node(idx));
        match centroid.and_then(|n| n.centroid.map(|c| (c, n.level))) {
            Some((coordinate, level)) => GeoResolution {
                coordinate: Some(coordinate),
                tier: ResolutionTier::for_level(level),
                degradations,
            },
            None => GeoResolution {
                coordinate: None,
                tier: ResolutionTier::Unresolved,
                degradations,
            },
        }
    }

    /// Hand the call to the worker pool and stop waiting after the timeout.
    /// A late answer is dropped with the reply channel.
    fn call_with_timeout(
        &self,
        geocoder: &Arc<dyn Geocoder>,
        query: GeocodeQuery,
    ) -> GeocodeResult {
        let pool = self
            .pool
            .get_or_init(|| GeocoderPool::start(Arc::clone(geocoder), self.workers, self.queue));
        let rx = pool.submit(query)?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                Err(GeocodeError::Timeout(self.timeout.as_millis() as u64))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(GeocodeError::Unavailable(
                "geocoder worker exited without a result".to_string(),
            )),
        }
    }
}

/// Reject geocoder answers that are not coordinates or that fall outside the
/// nearest bounded region on the resolved chain
fn check_point(
    point: Coordinate,
    resolved: Option<NodeIdx>,
    hierarchy: &HierarchySnapshot,
) -> Result<(), Degradation> {
    if !point.is_valid() {
        let error = GeocodeError::InvalidCoordinate { lat: point.lat, lon: point.lon };
        return Err(Degradation::GeocoderFailure { message: error.to_string() });
    }
    let bounds = resolved
        .and_then(|idx| hierarchy.find_up(idx, |n| n.bounds.is_some()))
        .and_then(|idx| hierarchy.node(idx).bounds);
    match bounds {
        Some(b) if !b.contains(&point) => {
            tracing::warn!(lat = point.lat, lon = point.lon, "geocoder result outside region");
            Err(Degradation::GeocodeOutOfBounds { lat: point.lat, lon: point.lon })
        }
        _ => Ok(()),
    }
}
