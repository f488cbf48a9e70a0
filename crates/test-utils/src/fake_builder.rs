use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use containerhive::errors::HiveError;
use containerhive::exec::{BuildFuture, BuildOutput, BuildRequest, ImageBuilder};

use crate::events::{Event, EventLog};

/// A fake builder that:
/// - records start/finish of every build in the shared event log
/// - keeps every request it received
/// - fails for configured images, and can be slowed down per image.
#[derive(Debug, Default)]
pub struct FakeBuilder {
    log: EventLog,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    requests: Arc<Mutex<Vec<BuildRequest>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeBuilder {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, image: &str) -> Self {
        self.failing.insert(image.to_string());
        self
    }

    pub fn with_delay(mut self, image: &str, delay: Duration) -> Self {
        self.delays.insert(image.to_string(), delay);
        self
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of builds observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ImageBuilder for FakeBuilder {
    fn build(&self, request: BuildRequest) -> BuildFuture<'_> {
        Box::pin(async move {
            let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(running, Ordering::SeqCst);

            self.log.record(Event::BuildStarted {
                image: request.image.clone(),
                tag: request.tag.clone(),
            });
            self.requests.lock().unwrap().push(request.clone());

            let delay = self
                .delays
                .get(&request.image)
                .copied()
                .unwrap_or(Duration::from_millis(5));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(&request.image) {
                return Err(HiveError::BuildError {
                    image: request.image.clone(),
                    reason: "fake build failure".to_string(),
                });
            }

            self.log.record(Event::BuildFinished {
                image: request.image.clone(),
                tag: request.tag.clone(),
            });

            Ok(BuildOutput {
                archive: request.output,
            })
        })
    }
}
