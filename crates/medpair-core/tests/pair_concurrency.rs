//! Concurrency properties of the pair cache.
//!
//! The central hazard: two jobs observe the same pair as uncached, both
//! consult the oracle, and both write. The pair lock table plus the
//! idempotent commit must collapse that to exactly one oracle call and
//! one symmetric committed pair.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use medpair_core::{
    Database, EngineConfig, InteractionEngine, JobRunner, JobStatus, Medication, MockOracle,
    NullAlertSink, OracleJudgment, PairLockTable, PairwiseCheckJob, RetryPolicy, SkipReason,
    Severity, UserMedication,
};
use medpair_core::job::DbCoMedicationSource;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn seeded_db(names: &[&str]) -> (Arc<Mutex<Database>>, Vec<Medication>) {
    init_tracing();
    let db = Database::open_in_memory().unwrap();
    let medications: Vec<Medication> = names
        .iter()
        .map(|name| {
            let m = Medication::new(*name);
            db.upsert_medication(&m).unwrap();
            m
        })
        .collect();
    (Arc::new(Mutex::new(db)), medications)
}

fn positive(id: &str, severity: Severity) -> OracleJudgment {
    OracleJudgment {
        medication_id: id.into(),
        has_interaction: true,
        severity,
        description: "interaction".into(),
        recommendation: None,
    }
}

#[test]
fn n_concurrent_checks_call_oracle_once() {
    let (db, meds) = seeded_db(&["Warfarin", "Aspirin"]);
    let (a, b) = (&meds[0], &meds[1]);

    // Slow oracle so every thread is in flight before the first commit.
    let oracle = Arc::new(
        MockOracle::new(vec![positive(&b.id, Severity::Moderate)])
            .with_latency(Duration::from_millis(100)),
    );
    let engine = Arc::new(InteractionEngine::new(
        db.clone(),
        Arc::new(PairLockTable::new()),
        oracle.clone(),
        EngineConfig::default(),
    ));

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            let primary = a.id.clone();
            let candidate = b.id.clone();
            std::thread::spawn(move || engine.check_interactions(&primary, &[candidate]).unwrap())
        })
        .collect();

    let outcomes: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

    // Exactly one caller reached the oracle; the rest observed its result.
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.oracle_called).count(), 1);
    for outcome in &outcomes {
        assert_eq!(outcome.findings.len(), 1);
        assert_eq!(outcome.findings[0].severity, Severity::Moderate);
    }

    // One symmetric pair committed, nothing duplicated.
    let store = db.lock().unwrap();
    assert_eq!(store.cached_pair_count().unwrap(), 2);
    assert_eq!(store.load_interaction_cache(&a.id).unwrap().len(), 1);
    assert_eq!(store.load_interaction_cache(&b.id).unwrap().len(), 1);
}

#[test]
fn opposite_direction_checks_share_one_oracle_call() {
    let (db, meds) = seeded_db(&["Warfarin", "Aspirin"]);
    let (a, b) = (&meds[0], &meds[1]);

    let oracle = Arc::new(
        MockOracle::new(vec![
            positive(&a.id, Severity::Severe),
            positive(&b.id, Severity::Severe),
        ])
        .with_latency(Duration::from_millis(100)),
    );
    let engine = Arc::new(InteractionEngine::new(
        db.clone(),
        Arc::new(PairLockTable::new()),
        oracle.clone(),
        EngineConfig::default(),
    ));

    let forward = {
        let engine = engine.clone();
        let (p, c) = (a.id.clone(), b.id.clone());
        std::thread::spawn(move || engine.check_interactions(&p, &[c]).unwrap())
    };
    let reverse = {
        let engine = engine.clone();
        let (p, c) = (b.id.clone(), a.id.clone());
        std::thread::spawn(move || engine.check_interactions(&p, &[c]).unwrap())
    };

    let forward = forward.join().unwrap();
    let reverse = reverse.join().unwrap();

    // A→B and B→A canonicalize to the same lock, so one side waits and
    // then reads the other side's symmetric commit.
    assert_eq!(oracle.call_count(), 1);
    assert_eq!(forward.findings.len(), 1);
    assert_eq!(reverse.findings.len(), 1);
    assert_eq!(forward.findings[0].severity, reverse.findings[0].severity);

    let store = db.lock().unwrap();
    assert_eq!(store.cached_pair_count().unwrap(), 2);
}

#[test]
fn overlapping_multi_pair_checks_do_not_deadlock() {
    // job(A, {B, C}) races job(B, {A, C}); the shared A:B pair plus the
    // disjoint pairs must all resolve without deadlock (keys are acquired
    // in canonical sorted order).
    let (db, meds) = seeded_db(&["Warfarin", "Aspirin", "Ibuprofen"]);
    let (a, b, c) = (&meds[0], &meds[1], &meds[2]);

    let oracle = Arc::new(
        MockOracle::new(vec![
            positive(&a.id, Severity::Moderate),
            positive(&b.id, Severity::Moderate),
            positive(&c.id, Severity::Moderate),
        ])
        .with_latency(Duration::from_millis(50)),
    );
    let engine = Arc::new(InteractionEngine::new(
        db.clone(),
        Arc::new(PairLockTable::new()),
        oracle.clone(),
        EngineConfig::default(),
    ));

    let first = {
        let engine = engine.clone();
        let (p, c1, c2) = (a.id.clone(), b.id.clone(), c.id.clone());
        std::thread::spawn(move || engine.check_interactions(&p, &[c1, c2]).unwrap())
    };
    let second = {
        let engine = engine.clone();
        let (p, c1, c2) = (b.id.clone(), a.id.clone(), c.id.clone());
        std::thread::spawn(move || engine.check_interactions(&p, &[c1, c2]).unwrap())
    };

    first.join().unwrap();
    second.join().unwrap();

    let store = db.lock().unwrap();
    // Pairs A:B, A:C, B:C each committed exactly once (two directions each).
    assert_eq!(store.cached_pair_count().unwrap(), 6);
    assert!(store.has_cached_pair(&a.id, &b.id).unwrap());
    assert!(store.has_cached_pair(&a.id, &c.id).unwrap());
    assert!(store.has_cached_pair(&b.id, &c.id).unwrap());
}

#[test]
fn symmetry_holds_for_every_committed_pair() {
    let (db, meds) = seeded_db(&["Warfarin", "Aspirin", "Ibuprofen", "Amiodarone"]);
    let a = &meds[0];

    let oracle = Arc::new(MockOracle::new(vec![
        positive(&meds[1].id, Severity::Mild),
        positive(&meds[2].id, Severity::Moderate),
        positive(&meds[3].id, Severity::Contraindicated),
    ]));
    let engine = InteractionEngine::new(
        db.clone(),
        Arc::new(PairLockTable::new()),
        oracle,
        EngineConfig::default(),
    );

    let candidates: Vec<String> = meds[1..].iter().map(|m| m.id.clone()).collect();
    engine.check_interactions(&a.id, &candidates).unwrap();

    let store = db.lock().unwrap();
    for medication in &meds {
        for record in store.load_interaction_cache(&medication.id).unwrap() {
            let reverse = store.load_interaction_cache(&record.related_medication_id).unwrap();
            let mirrored = reverse
                .iter()
                .find(|r| r.related_medication_id == medication.id)
                .expect("missing reverse record");
            assert_eq!(mirrored.has_interaction, record.has_interaction);
            assert_eq!(mirrored.severity, record.severity);
        }
    }
}

#[test]
fn concurrent_jobs_through_the_runner_settle_to_one_oracle_call() {
    let (db, meds) = seeded_db(&["Warfarin", "Aspirin"]);
    let (a, b) = (&meds[0], &meds[1]);

    let trigger_a = UserMedication::new("user-1", a.id.clone());
    let trigger_b = UserMedication::new("user-1", b.id.clone());
    {
        let store = db.lock().unwrap();
        store.upsert_user_medication(&trigger_a).unwrap();
        store.upsert_user_medication(&trigger_b).unwrap();
    }

    let oracle = Arc::new(
        MockOracle::new(vec![
            positive(&a.id, Severity::Severe),
            positive(&b.id, Severity::Severe),
        ])
        .with_latency(Duration::from_millis(50)),
    );
    let engine = Arc::new(InteractionEngine::new(
        db.clone(),
        Arc::new(PairLockTable::new()),
        oracle.clone(),
        EngineConfig::default(),
    ));
    let job = Arc::new(PairwiseCheckJob::new(
        engine,
        Arc::new(DbCoMedicationSource::new(db.clone())),
        Arc::new(NullAlertSink),
    ));

    let runner = JobRunner::start(job, 4, RetryPolicy::default());
    runner.enqueue(trigger_a).unwrap();
    runner.enqueue(trigger_b).unwrap();

    let mut statuses = Vec::new();
    for _ in 0..2 {
        statuses.push(runner.next_report(Duration::from_secs(10)).unwrap().status);
    }

    assert_eq!(oracle.call_count(), 1);
    // One job computed the pair; the other either raced into a cache hit
    // (AlreadyChecked) or lost the lock and completed with zero fresh work.
    let completed = statuses
        .iter()
        .filter(|s| matches!(s, JobStatus::Completed { .. }))
        .count();
    let skipped = statuses
        .iter()
        .filter(|s| matches!(s, JobStatus::Skipped(SkipReason::AlreadyChecked)))
        .count();
    assert_eq!(completed + skipped, 2);
    assert!(completed >= 1);

    let store = db.lock().unwrap();
    assert_eq!(store.cached_pair_count().unwrap(), 2);
}
