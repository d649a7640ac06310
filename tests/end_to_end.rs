//! End-to-end scenarios for the snapshot provider pipeline, driven through
//! fake host services: a configuration service, an evaluation source, and a
//! catalog source.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, watch};

use depsnap::{
    CatalogSource, ConfigurationService, ConfiguredProject, ContextError, CrossTargetContext,
    DeclaredTargets, DependencyHandler, EvaluationSource, EvaluationUpdate, ProviderConfig,
    ProviderState, RuleDiff, RuleHandler, SnapshotProvider, SourceFault, SourceVersion,
    TargetFramework, VersionedCatalogs, SHARED_PROJECT_RULE,
};

// ---- fakes -----------------------------------------------------------------

struct FakeConfiguration {
    declared: Mutex<DeclaredTargets>,
    generation: watch::Sender<u64>,
}

impl FakeConfiguration {
    fn single(active: &str) -> Arc<Self> {
        Arc::new(Self {
            declared: Mutex::new(DeclaredTargets::single(TargetFramework::new(active))),
            generation: watch::channel(0).0,
        })
    }

    fn set_cross(&self, active: &str, frameworks: &[&str]) {
        *self.declared.lock().unwrap() = DeclaredTargets::cross(
            TargetFramework::new(active),
            frameworks.iter().map(|f| TargetFramework::new(f)).collect(),
        );
        self.generation.send_modify(|g| *g += 1);
    }
}

#[async_trait]
impl ConfigurationService for FakeConfiguration {
    fn declared(&self) -> DeclaredTargets {
        self.declared.lock().unwrap().clone()
    }

    async fn refresh_active(&self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn create_context(&self) -> Result<CrossTargetContext, ContextError> {
        let declared = self.declared();
        let projects: Vec<_> = declared
            .frameworks
            .iter()
            .map(|t| ConfiguredProject::new(t.clone(), format!("Debug|AnyCPU|{t}")))
            .collect();
        Ok(CrossTargetContext::new(
            declared.active,
            projects,
            declared.cross_targeting,
        ))
    }

    fn generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

/// Hands out a fresh channel per (target, joint/evaluation-only) subscription
/// and keeps the sender so tests can push batches. Re-subscribing a target
/// replaces the sender; the torn-down feed completes naturally.
#[derive(Default)]
struct FakeEvaluation {
    feeds: Mutex<HashMap<(TargetFramework, bool), mpsc::Sender<Result<EvaluationUpdate, SourceFault>>>>,
    subscriptions: AtomicUsize,
}

impl FakeEvaluation {
    async fn push(&self, target: &str, joint: bool, update: EvaluationUpdate) {
        let sender = self
            .feeds
            .lock()
            .unwrap()
            .get(&(TargetFramework::new(target), joint))
            .expect("subscribed feed")
            .clone();
        sender.send(Ok(update)).await.unwrap();
    }
}

impl EvaluationSource for FakeEvaluation {
    fn subscribe(
        &self,
        project: &ConfiguredProject,
        _evaluation_rules: &[String],
        build_rules: &[String],
    ) -> mpsc::Receiver<Result<EvaluationUpdate, SourceFault>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(16);
        self.feeds
            .lock()
            .unwrap()
            .insert((project.target().clone(), !build_rules.is_empty()), tx);
        rx
    }
}

struct FakeCatalogs {
    tx: watch::Sender<Arc<VersionedCatalogs>>,
}

impl FakeCatalogs {
    fn always_aligned() -> Arc<Self> {
        let (tx, _) = watch::channel(Arc::new(VersionedCatalogs {
            version: u64::MAX,
            ..VersionedCatalogs::default()
        }));
        Arc::new(Self { tx })
    }
}

impl CatalogSource for FakeCatalogs {
    fn watch(&self, _project: &ConfiguredProject) -> watch::Receiver<Arc<VersionedCatalogs>> {
        self.tx.subscribe()
    }
}

// ---- helpers ---------------------------------------------------------------

fn package_handlers() -> Vec<Arc<dyn DependencyHandler>> {
    vec![Arc::new(
        RuleHandler::new("PackageDependency", "PackageReference")
            .with_resolved_rule("ResolvedPackageReference"),
    )]
}

fn diff(added: &[&str], removed: &[&str]) -> RuleDiff {
    let mut d = RuleDiff::default();
    for id in added {
        d.added.insert(id.to_string());
        d.items.insert(id.to_string(), BTreeMap::new());
    }
    for id in removed {
        d.removed.insert(id.to_string());
    }
    d
}

fn package_batch(ordinal: u64, declared: &[&str], resolved: &[&str]) -> EvaluationUpdate {
    let mut evaluation = BTreeMap::new();
    evaluation.insert("PackageReference".to_string(), diff(declared, &[]));
    let mut build = BTreeMap::new();
    build.insert("ResolvedPackageReference".to_string(), diff(resolved, &[]));
    EvaluationUpdate {
        version: SourceVersion::new("Debug", ordinal),
        evaluation,
        build: Some(build),
    }
}

fn shared_batch(ordinal: u64, added: &[&str], removed: &[&str]) -> EvaluationUpdate {
    let mut evaluation = BTreeMap::new();
    evaluation.insert(SHARED_PROJECT_RULE.to_string(), diff(added, removed));
    EvaluationUpdate {
        version: SourceVersion::new("Debug", ordinal),
        evaluation,
        build: None,
    }
}

fn empty_batch(ordinal: u64) -> EvaluationUpdate {
    let mut evaluation = BTreeMap::new();
    evaluation.insert("PackageReference".to_string(), RuleDiff::default());
    EvaluationUpdate {
        version: SourceVersion::new("Debug", ordinal),
        evaluation,
        build: Some(BTreeMap::new()),
    }
}

async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    let poll = async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), poll)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for: {what}"));
}

struct Rig {
    provider: Arc<SnapshotProvider>,
    configuration: Arc<FakeConfiguration>,
    evaluation: Arc<FakeEvaluation>,
}

async fn load_single_target() -> Rig {
    let configuration = FakeConfiguration::single("net6.0");
    let evaluation = Arc::new(FakeEvaluation::default());
    let provider = SnapshotProvider::load(
        ProviderConfig::default(),
        configuration.clone(),
        evaluation.clone(),
        FakeCatalogs::always_aligned(),
        package_handlers(),
    )
    .await
    .expect("load");
    Rig {
        provider,
        configuration,
        evaluation,
    }
}

// ---- scenarios -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn scenario_a_package_appears_resolved_under_its_framework() {
    let rig = load_single_target().await;
    let net6 = TargetFramework::new("net6.0");
    assert_eq!(rig.provider.state(), ProviderState::Active);

    rig.evaluation
        .push("net6.0", true, package_batch(1, &["PkgA"], &["PkgA"]))
        .await;

    wait_until("PkgA in snapshot", || {
        rig.provider
            .current_snapshot()
            .slice(&net6)
            .is_some_and(|slice| slice.find("PackageDependency", "PkgA").is_some())
    })
    .await;

    let snapshot = rig.provider.current_snapshot();
    let slice = snapshot.slice(&net6).unwrap();
    assert_eq!(slice.len(), 1);
    let pkg = slice.find("PackageDependency", "PkgA").unwrap();
    assert!(pkg.resolved);
    assert!(pkg.top_level);
    rig.provider.dispose();
}

#[tokio::test(start_paused = true)]
async fn scenario_b_retargeting_keeps_existing_slice_by_reference() {
    let rig = load_single_target().await;
    let net6 = TargetFramework::new("net6.0");
    let net7 = TargetFramework::new("net7.0");

    rig.evaluation
        .push("net6.0", true, package_batch(1, &["PkgA"], &["PkgA"]))
        .await;
    wait_until("PkgA present", || {
        rig.provider
            .current_snapshot()
            .slice(&net6)
            .is_some_and(|s| s.len() == 1)
    })
    .await;
    let before = rig.provider.current_snapshot();
    let six_before = Arc::clone(before.slice(&net6).unwrap());
    let subscriptions_before = rig.evaluation.subscriptions.load(Ordering::SeqCst);

    rig.configuration.set_cross("net6.0", &["net6.0", "net7.0"]);

    wait_until("both frameworks present", || {
        rig.provider.current_snapshot().slice(&net7).is_some()
    })
    .await;

    let after = rig.provider.current_snapshot();
    // net6.0's prior dependencies are preserved unchanged: same object.
    assert!(Arc::ptr_eq(&six_before, after.slice(&net6).unwrap()));
    assert!(after.slice(&net7).unwrap().is_empty());

    // Old subscriptions were released and new ones attached for both
    // frameworks (two subscribers × two frameworks).
    let subscriptions_after = rig.evaluation.subscriptions.load(Ordering::SeqCst);
    assert_eq!(subscriptions_after - subscriptions_before, 4);

    let context = rig.provider.current_context().unwrap();
    assert!(context.is_cross_targeting());
    assert!(rig.provider.configured_project(&net7).is_some());
    rig.provider.dispose();
}

#[tokio::test(start_paused = true)]
async fn scenario_c_broken_build_batch_leaves_snapshot_untouched() {
    let rig = load_single_target().await;
    let net6 = TargetFramework::new("net6.0");

    rig.evaluation
        .push("net6.0", true, package_batch(1, &["PkgA"], &["PkgA"]))
        .await;
    wait_until("PkgA present", || {
        rig.provider
            .current_snapshot()
            .slice(&net6)
            .is_some_and(|s| s.len() == 1)
    })
    .await;
    let before = rig.provider.current_snapshot();

    // A broken design-time build reports zero rule changes.
    rig.evaluation.push("net6.0", true, empty_batch(2)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let after = rig.provider.current_snapshot();
    assert!(Arc::ptr_eq(&before, &after), "empty batch must be a no-op");
    rig.provider.dispose();
}

#[tokio::test(start_paused = true)]
async fn scenario_d_removed_shared_project_disappears() {
    let rig = load_single_target().await;
    let net6 = TargetFramework::new("net6.0");
    let import = "../Shared/Common.projitems";

    rig.evaluation
        .push("net6.0", false, shared_batch(1, &[import], &[]))
        .await;
    wait_until("shared project present", || {
        rig.provider
            .current_snapshot()
            .slice(&net6)
            .is_some_and(|s| s.find("SharedProjectDependency", import).is_some())
    })
    .await;

    rig.evaluation
        .push("net6.0", false, shared_batch(2, &[], &[import]))
        .await;
    wait_until("shared project removed", || {
        rig.provider
            .current_snapshot()
            .slice(&net6)
            .is_some_and(|s| s.find("SharedProjectDependency", import).is_none())
    })
    .await;
    rig.provider.dispose();
}

#[tokio::test(start_paused = true)]
async fn notifications_are_debounced_and_carry_latest_snapshot() {
    let rig = load_single_target().await;
    let net6 = TargetFramework::new("net6.0");

    // Let the load-time shape notification drain first.
    let mut changes = rig.provider.subscribe();
    tokio::time::sleep(Duration::from_secs(1)).await;
    while changes.try_recv().is_ok() {}

    for (ordinal, pkg) in [(1, "PkgA"), (2, "PkgB"), (3, "PkgC")] {
        rig.evaluation
            .push("net6.0", true, package_batch(ordinal, &[pkg], &[pkg]))
            .await;
    }

    let snapshot = tokio::time::timeout(Duration::from_secs(5), changes.recv())
        .await
        .expect("notification")
        .expect("stream open");
    assert_eq!(snapshot.slice(&net6).unwrap().len(), 3);
    // The burst collapsed into a single notification.
    assert!(matches!(
        changes.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
    rig.provider.dispose();
}

#[tokio::test(start_paused = true)]
async fn dispose_completes_stream_and_fails_subsequent_calls() {
    let rig = load_single_target().await;
    let mut changes = rig.provider.subscribe();

    rig.provider.dispose();
    assert_eq!(rig.provider.state(), ProviderState::Disposed);
    rig.provider.dispose(); // idempotent

    wait_until("stream completion", || {
        matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        )
    })
    .await;

    let err = rig.provider.refresh().await.unwrap_err();
    assert_eq!(err.as_label(), "provider_disposed");
    // The snapshot itself stays readable after disposal.
    let _ = rig.provider.current_snapshot();
}

/// Turns cross-targeting while its first context is being built: the
/// returned context reflects the pre-change shape, and the generation bump
/// lands before the provider finishes loading.
struct ShiftingConfiguration {
    declared: Mutex<DeclaredTargets>,
    generation: watch::Sender<u64>,
    shifted: AtomicBool,
}

#[async_trait]
impl ConfigurationService for ShiftingConfiguration {
    fn declared(&self) -> DeclaredTargets {
        self.declared.lock().unwrap().clone()
    }

    async fn refresh_active(&self) -> Result<(), ContextError> {
        Ok(())
    }

    async fn create_context(&self) -> Result<CrossTargetContext, ContextError> {
        let declared = self.declared();
        if !self.shifted.swap(true, Ordering::SeqCst) {
            *self.declared.lock().unwrap() = DeclaredTargets::cross(
                TargetFramework::new("net6.0"),
                vec![TargetFramework::new("net6.0"), TargetFramework::new("net7.0")],
            );
            self.generation.send_modify(|g| *g += 1);
        }
        let projects: Vec<_> = declared
            .frameworks
            .iter()
            .map(|t| ConfiguredProject::new(t.clone(), format!("Debug|AnyCPU|{t}")))
            .collect();
        Ok(CrossTargetContext::new(
            declared.active,
            projects,
            declared.cross_targeting,
        ))
    }

    fn generation(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}

#[tokio::test(start_paused = true)]
async fn shape_change_during_load_still_triggers_refresh() {
    let configuration = Arc::new(ShiftingConfiguration {
        declared: Mutex::new(DeclaredTargets::single(TargetFramework::new("net6.0"))),
        generation: watch::channel(0).0,
        shifted: AtomicBool::new(false),
    });
    let provider = SnapshotProvider::load(
        ProviderConfig::default(),
        configuration,
        Arc::new(FakeEvaluation::default()),
        FakeCatalogs::always_aligned(),
        package_handlers(),
    )
    .await
    .expect("load");

    // The bump fired mid-initialization; the watcher must still pick it up
    // and rebuild against the widened framework set.
    wait_until("net7.0 slice appears", || {
        provider
            .current_snapshot()
            .slice(&TargetFramework::new("net7.0"))
            .is_some()
    })
    .await;
    assert!(provider.current_context().unwrap().is_cross_targeting());
    provider.dispose();
}
