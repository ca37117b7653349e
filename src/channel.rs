use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::{LookupFailure, LookupResult, RatingSource};

// === Internal message channel ===
// The enrichment loop never touches the network directly; it sends
// LookupRequests here and joins the tickets. Each request carries its own
// reply sender, so every lookup gets exactly one response and concurrent
// lookups cannot cross wires.

pub(crate) struct LookupRequest {
    pub(crate) prof_name: String,
    reply: mpsc::Sender<LookupResult>,
}

/// Promise-like handle for one in-flight lookup. `wait` blocks until the
/// gateway settles the request; a torn-down channel surfaces as a failed
/// lookup rather than a panic.
pub(crate) struct LookupTicket {
    rx: mpsc::Receiver<LookupResult>,
}

impl LookupTicket {
    pub(crate) fn wait(self) -> LookupResult {
        match self.rx.recv() {
            Ok(result) => result,
            Err(_) => Err(LookupFailure::Channel),
        }
    }
}

#[derive(Clone)]
pub(crate) struct GatewayClient {
    tx: mpsc::Sender<LookupRequest>,
}

impl GatewayClient {
    /// Fire one lookup. Always returns a ticket; if the service is already
    /// gone the ticket settles immediately with a channel failure.
    pub(crate) fn lookup(&self, prof_name: &str) -> LookupTicket {
        let (reply, rx) = mpsc::channel();
        let request = LookupRequest {
            prof_name: prof_name.to_string(),
            reply,
        };
        if self.tx.send(request).is_err() {
            eprintln!("[gateway] service unavailable for '{prof_name}'");
            // `reply` was moved into the dropped request, so `rx` reports a
            // disconnect and `wait` maps it to LookupFailure::Channel.
        }
        LookupTicket { rx }
    }
}

/// Worker pool draining the request queue. The pool size bounds how many
/// lookups are in flight at once; requests beyond that queue up.
pub(crate) struct GatewayService {
    handles: Vec<thread::JoinHandle<()>>,
}

impl GatewayService {
    pub(crate) fn start(
        source: Arc<dyn RatingSource + Send + Sync>,
        workers: usize,
    ) -> (GatewayService, GatewayClient) {
        let (tx, rx) = mpsc::channel::<LookupRequest>();
        let rx = Arc::new(Mutex::new(rx));

        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let source = Arc::clone(&source);
            handles.push(thread::spawn(move || loop {
                let request = {
                    let guard = match rx.lock() {
                        Ok(guard) => guard,
                        Err(_) => break,
                    };
                    guard.recv()
                };
                let Ok(request) = request else { break };
                let result = source.lookup(&request.prof_name);
                // Receiver may have given up; a dead reply channel is not
                // the worker's problem.
                let _ = request.reply.send(result);
            }));
        }

        (GatewayService { handles }, GatewayClient { tx })
    }

    /// Join the workers. All clients must be dropped first or this blocks
    /// until they are.
    pub(crate) fn shutdown(self) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProfessorRecord;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Table-driven stub source: names resolve to records, "miss:" prefixed
    /// names to not-found, "fail:" prefixed names to a request failure.
    struct StubSource {
        records: HashMap<String, ProfessorRecord>,
        delay: Duration,
    }

    impl StubSource {
        fn new(names: &[(&str, f64)]) -> Self {
            let mut records = HashMap::new();
            for (name, rating) in names {
                records.insert(name.to_string(), record(name, *rating));
            }
            StubSource {
                records,
                delay: Duration::ZERO,
            }
        }
    }

    fn record(name: &str, rating: f64) -> ProfessorRecord {
        let (last, first) = name.split_once(", ").unwrap_or((name, ""));
        ProfessorRecord {
            id: format!("stub-{name}"),
            legacy_id: Some(42),
            avg_rating: Some(rating),
            avg_difficulty: Some(2.5),
            would_take_again_percent: Some(80.0),
            first_name: first.to_string(),
            last_name: last.to_string(),
            department: None,
        }
    }

    impl RatingSource for StubSource {
        fn lookup(&self, prof_name: &str) -> LookupResult {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            if prof_name.starts_with("fail:") {
                return Err(LookupFailure::RequestFailed(500));
            }
            match self.records.get(prof_name) {
                Some(rec) => Ok(Some(vec![rec.clone()])),
                None => Ok(None),
            }
        }
    }

    #[test]
    fn single_lookup_round_trip() {
        let source = Arc::new(StubSource::new(&[("Smith, Jane", 4.2)]));
        let (service, client) = GatewayService::start(source, 2);

        let result = client.lookup("Smith, Jane").wait();
        let records = result.unwrap().unwrap();
        assert_eq!(records[0].last_name, "Smith");

        drop(client);
        service.shutdown();
    }

    #[test]
    fn unknown_name_is_not_found() {
        let source = Arc::new(StubSource::new(&[]));
        let (service, client) = GatewayService::start(source, 1);

        assert_eq!(client.lookup("Nobody, Real").wait(), Ok(None));

        drop(client);
        service.shutdown();
    }

    #[test]
    fn concurrent_mixed_outcomes_all_settle() {
        let mut source = StubSource::new(&[("Smith, Jane", 4.2), ("Jones, Bob", 3.1)]);
        source.delay = Duration::from_millis(20);
        let (service, client) = GatewayService::start(Arc::new(source), 4);

        let names = [
            "Smith, Jane",
            "fail:Broken, One",
            "Jones, Bob",
            "miss:Unknown, Who",
            "fail:Broken, Two",
            "Smith, Jane",
        ];
        let tickets: Vec<_> = names.iter().map(|n| client.lookup(n)).collect();
        let results: Vec<_> = tickets.into_iter().map(|t| t.wait()).collect();

        assert_eq!(results.len(), names.len());
        assert!(results[0].as_ref().is_ok_and(|r| r.is_some()));
        assert_eq!(results[1], Err(LookupFailure::RequestFailed(500)));
        assert!(results[2].as_ref().is_ok_and(|r| r.is_some()));
        assert_eq!(results[3], Ok(None));
        assert_eq!(results[4], Err(LookupFailure::RequestFailed(500)));
        assert!(results[5].as_ref().is_ok_and(|r| r.is_some()));

        drop(client);
        service.shutdown();
    }

    #[test]
    fn dead_service_maps_to_channel_failure() {
        let (tx, rx) = mpsc::channel::<LookupRequest>();
        drop(rx);
        let client = GatewayClient { tx };

        assert_eq!(
            client.lookup("Smith, Jane").wait(),
            Err(LookupFailure::Channel)
        );
    }

    #[test]
    fn exactly_one_response_per_ticket() {
        let source = Arc::new(StubSource::new(&[("Smith, Jane", 4.2)]));
        let (service, client) = GatewayService::start(source, 2);

        let ticket = client.lookup("Smith, Jane");
        let result = ticket.wait();
        assert!(result.is_ok());
        // Ticket is consumed by wait(); a second response cannot be observed
        // by construction. Issue a fresh lookup to confirm the service is
        // still healthy after the first round trip.
        assert!(client.lookup("Smith, Jane").wait().is_ok());

        drop(client);
        service.shutdown();
    }
}
