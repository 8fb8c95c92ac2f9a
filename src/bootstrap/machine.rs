//! Bootstrap state machine
//!
//! ```text
//!            record found                 backend ok
//!   Init ───────────────────▶ SettingUp ─────────────▶ Done
//!    │ ▲      setup(raw)         │  ▲
//!    │ │                         │  │ retry()
//!    │ └──── reset() ◀───────────┘  │
//!    │                     backend failed (error flag, no auto-retry)
//!    └─ no record: needs_setup, navigate to the setup route
//! ```
//!
//! Every attempt gets a fresh identifier and cancellation token. Starting a new
//! attempt (setup, retry, reset) cancels the previous token, and a result that
//! arrives for an identifier that is no longer current is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Config, FeatureFlags, RoutesConfig};
use crate::credential::{classify_input, CredentialRecord, RecordStore, SetupPlan};
use crate::error::{Error, InitError, Result};
use crate::storage::SafeStorage;

use super::initializer::WalletInitializer;
use super::navigation::Navigator;
use super::types::{AttemptOutcome, BootstrapError, BootstrapState, LoadStage};

/// Work an attempt performs while `SettingUp`
#[derive(Debug, Clone)]
enum AttemptPlan {
    /// Initialize from a record that is already persisted
    Initialize(CredentialRecord),
    /// Ask the backend for a new wallet, persist it on success
    ///
    /// `offer_profile` is set when setup input was empty, the only case where a
    /// new wallet may be sent on to profile creation.
    CreateFresh { offer_profile: bool },
}

#[derive(Debug, Default)]
struct Inner {
    state: BootstrapState,
    plan: Option<AttemptPlan>,
    token: Option<CancellationToken>,
}

impl Inner {
    /// Start a new attempt, cancelling the one in flight
    fn supersede(&mut self) -> (u64, CancellationToken) {
        if let Some(token) = self.token.take() {
            debug!("Cancelling attempt {}", self.state.attempt);
            token.cancel();
        }
        self.state.attempt += 1;
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        (self.state.attempt, token)
    }

    fn enter_setting_up(&mut self, plan: AttemptPlan) {
        self.plan = Some(plan);
        self.state.stage = LoadStage::SettingUp;
        self.state.error = None;
        self.state.needs_setup = false;
    }
}

/// Drives wallet bootstrap from a stored record or setup input
pub struct Bootstrapper {
    records: RecordStore,
    initializer: Arc<dyn WalletInitializer>,
    navigator: Arc<dyn Navigator>,
    flags: FeatureFlags,
    routes: RoutesConfig,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<BootstrapState>,
}

impl Bootstrapper {
    /// Create a bootstrapper with default flags and routes
    pub fn new(
        storage: SafeStorage,
        initializer: Arc<dyn WalletInitializer>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state_tx, _) = watch::channel(BootstrapState::default());
        Self {
            records: RecordStore::new(storage),
            initializer,
            navigator,
            flags: FeatureFlags::default(),
            routes: RoutesConfig::default(),
            inner: Mutex::new(Inner::default()),
            state_tx,
        }
    }

    /// Create a bootstrapper from loaded configuration
    pub fn from_config(
        config: &Config,
        initializer: Arc<dyn WalletInitializer>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self::new(config.open_storage(), initializer, navigator)
            .with_flags(config.flags.clone())
            .with_routes(config.routes.clone())
    }

    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_routes(mut self, routes: RoutesConfig) -> Self {
        self.routes = routes;
        self
    }

    /// Current snapshot
    pub fn state(&self) -> BootstrapState {
        self.inner().state.clone()
    }

    pub fn stage(&self) -> LoadStage {
        self.inner().state.stage
    }

    pub fn error(&self) -> Option<BootstrapError> {
        self.inner().state.error.clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner().state.is_ready()
    }

    pub fn needs_setup(&self) -> bool {
        self.inner().state.needs_setup
    }

    /// Receive every state change
    pub fn subscribe(&self) -> watch::Receiver<BootstrapState> {
        self.state_tx.subscribe()
    }

    /// The persisted record, if setup has completed
    pub fn record(&self) -> Option<CredentialRecord> {
        self.records.load()
    }

    /// Check if a completed record is persisted
    pub fn has_record(&self) -> bool {
        self.records.has_record()
    }

    /// Look for a persisted record and initialize from it
    ///
    /// Without a record the machine stays in `Init` and asks for setup.
    pub async fn start(&self) -> AttemptOutcome {
        if self.is_ready() {
            return AttemptOutcome::Ready;
        }

        let Some(record) = self.records.load() else {
            info!("No wallet found, setup required");
            {
                let mut inner = self.inner();
                inner.state.needs_setup = true;
                self.publish(&inner);
            }
            self.navigator.navigate(&self.routes.setup);
            return AttemptOutcome::NeedsSetup;
        };

        info!("Found {} wallet, initializing", record.kind);
        let (id, token) = {
            let mut inner = self.inner();
            let attempt = inner.supersede();
            inner.enter_setting_up(AttemptPlan::Initialize(record.clone()));
            self.publish(&inner);
            attempt
        };

        self.run(id, token, AttemptPlan::Initialize(record)).await
    }

    /// Classify setup input and bootstrap from it
    ///
    /// Importable input is persisted before the backend sees it. Anything else
    /// creates a fresh wallet, and nothing is written until the backend succeeds.
    pub async fn setup(&self, raw: &str) -> Result<AttemptOutcome> {
        let plan = classify_input(raw);

        let (id, token, plan) = {
            let mut inner = self.inner();
            if inner.state.stage == LoadStage::Done {
                return Err(Error::AlreadyDone);
            }

            let (id, token) = inner.supersede();

            let plan = match plan {
                SetupPlan::Import(record) => {
                    if let Err(e) = self.records.save(&record) {
                        warn!("Could not persist {} credential: {}", record.kind, e);
                        inner.token = None;
                        inner.plan = None;
                        let during = inner.state.stage;
                        inner.state.error = Some(BootstrapError::storage(&e, during));

                        // The attempt in flight is cancelled and its record may be gone
                        if inner.state.stage == LoadStage::SettingUp && self.records.load().is_none() {
                            inner.state.stage = LoadStage::Init;
                            inner.state.needs_setup = true;
                        }

                        self.publish(&inner);
                        return Ok(AttemptOutcome::NotPersisted(e));
                    }
                    info!("Importing {} wallet", record.kind);
                    AttemptPlan::Initialize(record)
                }
                SetupPlan::CreateFresh => {
                    let offer_profile = raw.trim().is_empty();
                    if offer_profile {
                        info!("No input, creating a new wallet");
                    } else {
                        info!("Input not recognized, creating a new wallet");
                    }
                    AttemptPlan::CreateFresh { offer_profile }
                }
            };

            inner.enter_setting_up(plan.clone());
            self.publish(&inner);
            (id, token, plan)
        };

        Ok(self.run(id, token, plan).await)
    }

    /// Run `setup` on the tokio runtime
    pub fn spawn_setup(self: &Arc<Self>, raw: impl Into<String>) -> JoinHandle<Result<AttemptOutcome>> {
        let this = Arc::clone(self);
        let raw = raw.into();
        tokio::spawn(async move { this.setup(&raw).await })
    }

    /// Repeat the last attempt with a fresh backend call
    pub async fn retry(&self) -> Result<AttemptOutcome> {
        let (id, token, plan) = {
            let mut inner = self.inner();
            if inner.state.stage == LoadStage::Done {
                return Err(Error::AlreadyDone);
            }
            let plan = inner.plan.clone().ok_or(Error::NothingToRetry)?;

            let (id, token) = inner.supersede();
            inner.enter_setting_up(plan.clone());
            self.publish(&inner);
            (id, token, plan)
        };

        info!("Retrying wallet setup (attempt {})", id);
        Ok(self.run(id, token, plan).await)
    }

    /// Forget the wallet and go back to setup
    ///
    /// Cancels any attempt in flight. The in-memory state is reset even when the
    /// storage cannot be cleared; that failure is reported and left on the error
    /// flag.
    pub fn reset(&self) -> Result<()> {
        let result = {
            let mut inner = self.inner();
            inner.supersede();
            inner.token = None;
            inner.plan = None;

            let result = if self.flags.reset_clears_all_storage {
                self.records.storage().clear()
            } else {
                self.records.clear()
            };

            inner.state.stage = LoadStage::Init;
            inner.state.needs_setup = true;
            inner.state.error = result
                .as_ref()
                .err()
                .map(|e| BootstrapError::storage(e, LoadStage::Init));
            self.publish(&inner);
            result
        };

        info!("Wallet reset");
        self.navigator.navigate(&self.routes.setup);
        result.map_err(Error::from)
    }

    /// Dismiss the error flag
    pub fn acknowledge_error(&self) {
        let mut inner = self.inner();
        if inner.state.error.take().is_some() {
            debug!("Error acknowledged");
            self.publish(&inner);
        }
    }

    async fn run(&self, id: u64, token: CancellationToken, plan: AttemptPlan) -> AttemptOutcome {
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Attempt {} cancelled", id);
                return AttemptOutcome::Superseded;
            }
            result = self.execute(&plan) => result,
        };

        self.finish(id, &plan, result)
    }

    async fn execute(&self, plan: &AttemptPlan) -> std::result::Result<Option<CredentialRecord>, InitError> {
        match plan {
            AttemptPlan::Initialize(record) => {
                if self.flags.local_key_mode
                    && (record.kind.is_private_key() || record.kind.is_watch_only())
                {
                    debug!("Local key mode, {} wallet ready without backend", record.kind);
                    return Ok(None);
                }
                self.initializer.initialize(record).await.map(|()| None)
            }
            AttemptPlan::CreateFresh { .. } => self.initializer.create_wallet().await.map(Some),
        }
    }

    fn finish(
        &self,
        id: u64,
        plan: &AttemptPlan,
        result: std::result::Result<Option<CredentialRecord>, InitError>,
    ) -> AttemptOutcome {
        let route = {
            let mut inner = self.inner();
            if inner.state.attempt != id {
                debug!("Discarding result of superseded attempt {}", id);
                return AttemptOutcome::Superseded;
            }
            inner.token = None;

            let route = match result {
                Err(e) => {
                    warn!("Wallet initialization failed via {}: {}", self.initializer.name(), e);
                    inner.state.error = Some(BootstrapError::initialization(&e));
                    self.publish(&inner);
                    return AttemptOutcome::Failed(e);
                }
                Ok(None) => self.routes.home.clone(),
                Ok(Some(created)) => {
                    if let Err(e) = self.records.save(&created) {
                        warn!("New wallet is live but could not be persisted: {}", e);
                        inner.state.error = Some(BootstrapError::storage(&e, LoadStage::SettingUp));
                    }
                    inner.plan = Some(AttemptPlan::Initialize(created));
                    self.fresh_wallet_route(plan)
                }
            };

            inner.state.stage = LoadStage::Done;
            self.publish(&inner);
            route
        };

        info!("Wallet ready");
        self.navigator.navigate(&route);
        AttemptOutcome::Ready
    }

    /// New-profile route only for wallets created from empty input, when no
    /// profile exists yet and no profile extension can supply one
    fn fresh_wallet_route(&self, plan: &AttemptPlan) -> String {
        let offer_profile = matches!(plan, AttemptPlan::CreateFresh { offer_profile: true });

        if offer_profile
            && !self.flags.profile_extension_present
            && self.records.profile_setup_stage().is_none()
        {
            self.routes.new_profile.clone()
        } else {
            self.routes.home.clone()
        }
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::navigation::RecordingNavigator;
    use crate::bootstrap::types::FailureSource;
    use crate::credential::CredentialKind;
    use crate::error::StorageError;
    use crate::credential::store::{KIND_KEY, PROFILE_STAGE_KEY, VALUE_KEY};
    use crate::storage::{KeyValueStore, MemoryStore};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{mpsc, oneshot};
    use tokio_test::{assert_pending, assert_ready};

    const WIF_KEY: &str = "5KJvsngHeMpm884wtkJNzQGaCErckhHJBGFsvd3VyK5qMZXj3hS";
    const MNEMONIC: &str =
        "legal winner thank year wave sausage worth useful legal winner thank yellow";
    const FRESH: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    /// Backend that answers from a script and counts calls
    #[derive(Default)]
    struct ScriptedInitializer {
        init_results: Mutex<VecDeque<std::result::Result<(), InitError>>>,
        create_error: Mutex<Option<InitError>>,
        init_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    impl ScriptedInitializer {
        fn failing_once(err: InitError) -> Self {
            let init = Self::default();
            init.init_results.lock().unwrap().push_back(Err(err));
            init
        }

        fn failing_create(err: InitError) -> Self {
            let init = Self::default();
            *init.create_error.lock().unwrap() = Some(err);
            init
        }

        fn init_calls(&self) -> usize {
            self.init_calls.load(Ordering::SeqCst)
        }

        fn create_calls(&self) -> usize {
            self.create_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WalletInitializer for ScriptedInitializer {
        async fn initialize(&self, _record: &CredentialRecord) -> std::result::Result<(), InitError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            self.init_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }

        async fn create_wallet(&self) -> std::result::Result<CredentialRecord, InitError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            match self.create_error.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(CredentialRecord::new(CredentialKind::Mnemonic, FRESH)),
            }
        }
    }

    type Gate = oneshot::Sender<std::result::Result<(), InitError>>;

    /// Backend whose calls block until the test opens their gate
    struct GatedInitializer {
        gates: Mutex<HashMap<String, oneshot::Receiver<std::result::Result<(), InitError>>>>,
        entered: mpsc::UnboundedSender<String>,
    }

    impl GatedInitializer {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
            let (entered, rx) = mpsc::unbounded_channel();
            let init = Arc::new(Self {
                gates: Mutex::new(HashMap::new()),
                entered,
            });
            (init, rx)
        }

        fn gate(&self, key: &str) -> Gate {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(key.to_string(), rx);
            tx
        }

        async fn wait(&self, key: &str) -> std::result::Result<(), InitError> {
            let gate = self.gates.lock().unwrap().remove(key);
            let _ = self.entered.send(key.to_string());
            match gate {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(InitError::Backend("gate dropped".into()))),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl WalletInitializer for GatedInitializer {
        async fn initialize(&self, record: &CredentialRecord) -> std::result::Result<(), InitError> {
            self.wait(&record.secret_or_address).await
        }

        async fn create_wallet(&self) -> std::result::Result<CredentialRecord, InitError> {
            self.wait("create").await?;
            Ok(CredentialRecord::new(CredentialKind::Mnemonic, FRESH))
        }
    }

    struct Harness {
        memory: Arc<MemoryStore>,
        nav: Arc<RecordingNavigator>,
        machine: Arc<Bootstrapper>,
    }

    fn harness_with(init: Arc<dyn WalletInitializer>, flags: FeatureFlags) -> Harness {
        let memory = Arc::new(MemoryStore::new());
        let nav = Arc::new(RecordingNavigator::new());
        let machine = Bootstrapper::new(SafeStorage::new(memory.clone()), init, nav.clone())
            .with_flags(flags);
        Harness {
            memory,
            nav,
            machine: Arc::new(machine),
        }
    }

    fn harness(init: Arc<dyn WalletInitializer>) -> Harness {
        harness_with(init, FeatureFlags::default())
    }

    fn stored(h: &Harness) -> Option<CredentialRecord> {
        RecordStore::new(SafeStorage::new(h.memory.clone())).load()
    }

    fn seed(h: &Harness, record: &CredentialRecord) {
        RecordStore::new(SafeStorage::new(h.memory.clone()))
            .save(record)
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_without_record_needs_setup() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());

        assert_eq!(h.machine.start().await, AttemptOutcome::NeedsSetup);
        assert_eq!(h.machine.stage(), LoadStage::Init);
        assert!(h.machine.needs_setup());
        assert_eq!(h.nav.paths(), vec!["/setup"]);
        assert_eq!(init.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_start_with_record_initializes() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());
        seed(&h, &CredentialRecord::new(CredentialKind::Mnemonic, MNEMONIC));

        assert_eq!(h.machine.start().await, AttemptOutcome::Ready);
        assert_eq!(h.machine.stage(), LoadStage::Done);
        assert!(h.machine.is_ready());
        assert!(!h.machine.needs_setup());
        assert_eq!(init.init_calls(), 1);
        assert_eq!(h.nav.last().as_deref(), Some("/"));

        // Idempotent once done
        assert_eq!(h.machine.start().await, AttemptOutcome::Ready);
        assert_eq!(init.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_start_failure_stays_setting_up() {
        let init = Arc::new(ScriptedInitializer::failing_once(InitError::Backend(
            "node offline".into(),
        )));
        let h = harness(init.clone());
        seed(&h, &CredentialRecord::new(CredentialKind::Mnemonic, MNEMONIC));

        let outcome = h.machine.start().await;
        assert!(matches!(outcome, AttemptOutcome::Failed(InitError::Backend(_))));
        assert_eq!(h.machine.stage(), LoadStage::SettingUp);

        let error = h.machine.error().unwrap();
        assert_eq!(error.occurred_during, LoadStage::SettingUp);
        assert_eq!(error.source, FailureSource::Initialization);

        // No automatic retry, no navigation
        tokio::task::yield_now().await;
        assert_eq!(init.init_calls(), 1);
        assert!(h.nav.paths().is_empty());
    }

    #[tokio::test]
    async fn test_setup_wif_persists_and_completes() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());
        h.machine.start().await;

        let outcome = h.machine.setup(WIF_KEY).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Ready);
        assert_eq!(h.machine.stage(), LoadStage::Done);
        assert_eq!(h.machine.error(), None);

        let record = stored(&h).unwrap();
        assert_eq!(record.kind, CredentialKind::WifKey);
        assert_eq!(record.secret_or_address, WIF_KEY);
        assert!(record.setup_completed);
        assert!(h.machine.has_record());
        assert_eq!(h.machine.record(), Some(record));
        assert_eq!(h.nav.paths(), vec!["/setup", "/"]);
    }

    #[test]
    fn test_import_persisted_before_initialize() {
        let (init, _entered) = GatedInitializer::new();
        let gate = init.gate(MNEMONIC);
        let h = harness(init);

        let machine = h.machine.clone();
        let mut task = tokio_test::task::spawn(async move { machine.setup(MNEMONIC).await });
        assert_pending!(task.poll());

        // Backend has not answered yet but the record is already complete on disk
        assert_eq!(h.machine.stage(), LoadStage::SettingUp);
        assert_eq!(stored(&h).map(|r| r.kind), Some(CredentialKind::Mnemonic));

        gate.send(Ok(())).unwrap();
        let outcome = assert_ready!(task.poll()).unwrap();
        assert_eq!(outcome, AttemptOutcome::Ready);
        assert_eq!(h.machine.stage(), LoadStage::Done);
    }

    #[test]
    fn test_fresh_wallet_not_persisted_while_creating() {
        let (init, _entered) = GatedInitializer::new();
        let gate = init.gate("create");
        let h = harness(init);

        let machine = h.machine.clone();
        let mut task = tokio_test::task::spawn(async move { machine.setup("not a key").await });
        assert_pending!(task.poll());

        assert_eq!(h.machine.stage(), LoadStage::SettingUp);
        assert!(h.memory.is_empty());
        assert!(h.memory.write_log().is_empty());

        gate.send(Ok(())).unwrap();
        assert_eq!(assert_ready!(task.poll()).unwrap(), AttemptOutcome::Ready);
        assert_eq!(stored(&h).unwrap().secret_or_address, FRESH);
    }

    #[tokio::test]
    async fn test_fresh_wallet_routes_to_new_profile() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());

        let outcome = h.machine.setup("").await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Ready);
        assert_eq!(init.create_calls(), 1);
        assert_eq!(init.init_calls(), 0);
        assert_eq!(stored(&h).unwrap().kind, CredentialKind::Mnemonic);
        assert_eq!(h.nav.last().as_deref(), Some("/newprofile"));
    }

    #[tokio::test]
    async fn test_fresh_wallet_with_existing_profile_goes_home() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        h.memory.set(PROFILE_STAGE_KEY, "completed").unwrap();

        h.machine.setup("").await.unwrap();
        assert_eq!(h.nav.last().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_fresh_wallet_with_profile_extension_goes_home() {
        let flags = FeatureFlags {
            profile_extension_present: true,
            ..FeatureFlags::default()
        };
        let h = harness_with(Arc::new(ScriptedInitializer::default()), flags);

        h.machine.setup("   ").await.unwrap();
        assert_eq!(h.nav.last().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_fresh_wallet_from_unrecognized_input_goes_home() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());

        assert_eq!(h.machine.setup("hello").await.unwrap(), AttemptOutcome::Ready);
        assert_eq!(init.create_calls(), 1);
        assert_eq!(h.nav.last().as_deref(), Some("/"));
    }

    #[tokio::test]
    async fn test_fresh_wallet_creation_failure_persists_nothing() {
        let init = Arc::new(ScriptedInitializer::failing_create(InitError::Unavailable(
            "offline".into(),
        )));
        let h = harness(init);

        let outcome = h.machine.setup("garbage").await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(InitError::Unavailable(_))));
        assert_eq!(h.machine.stage(), LoadStage::SettingUp);
        assert!(h.memory.is_empty());
        assert_eq!(
            h.machine.error().map(|e| e.source),
            Some(FailureSource::Initialization)
        );
    }

    #[tokio::test]
    async fn test_fresh_wallet_save_failure_is_flagged() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        h.memory.fail_writes_to(KIND_KEY);

        let outcome = h.machine.setup("garbage").await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Ready);
        assert_eq!(h.machine.stage(), LoadStage::Done);
        assert_eq!(stored(&h), None);

        let error = h.machine.error().unwrap();
        assert_eq!(error.source, FailureSource::Storage);
        assert_eq!(error.occurred_during, LoadStage::SettingUp);
    }

    #[tokio::test]
    async fn test_import_save_failure_keeps_stage() {
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness(init.clone());
        h.memory.set_available(false);

        let outcome = h.machine.setup(MNEMONIC).await.unwrap();
        assert_eq!(outcome, AttemptOutcome::NotPersisted(StorageError::Unavailable));
        assert_eq!(h.machine.stage(), LoadStage::Init);
        assert_eq!(init.init_calls(), 0);

        let error = h.machine.error().unwrap();
        assert_eq!(error.source, FailureSource::Storage);
        assert_eq!(error.occurred_during, LoadStage::Init);

        // Nothing to retry: the record never made it to storage
        assert!(matches!(h.machine.retry().await, Err(Error::NothingToRetry)));
    }

    #[tokio::test]
    async fn test_save_failure_during_attempt_returns_to_init() {
        let (init, mut entered) = GatedInitializer::new();
        let _gate = init.gate(MNEMONIC);
        let h = harness(init);

        let first = h.machine.spawn_setup(MNEMONIC);
        assert_eq!(entered.recv().await.as_deref(), Some(MNEMONIC));
        assert_eq!(h.machine.stage(), LoadStage::SettingUp);

        h.memory.fail_writes_to(VALUE_KEY);
        let second = format!("K{}", "x".repeat(51));
        let outcome = h.machine.setup(&second).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::NotPersisted(StorageError::Io(_))));
        assert_eq!(first.await.unwrap().unwrap(), AttemptOutcome::Superseded);

        // Nothing runs and nothing is stored, so the user is back at setup
        assert_eq!(stored(&h), None);
        assert_eq!(h.machine.stage(), LoadStage::Init);
        assert!(h.machine.needs_setup());
        let error = h.machine.error().unwrap();
        assert_eq!(error.source, FailureSource::Storage);
        assert_eq!(error.occurred_during, LoadStage::SettingUp);
        assert!(matches!(h.machine.retry().await, Err(Error::NothingToRetry)));
    }

    #[tokio::test]
    async fn test_retry_after_failure() {
        let init = Arc::new(ScriptedInitializer::failing_once(InitError::Unavailable(
            "timeout".into(),
        )));
        let h = harness(init.clone());

        let outcome = h.machine.setup(MNEMONIC).await.unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(ref e) if e.is_retryable()));
        let failed_attempt = h.machine.state().attempt;

        let outcome = h.machine.retry().await.unwrap();
        assert_eq!(outcome, AttemptOutcome::Ready);
        assert_eq!(init.init_calls(), 2);
        assert_eq!(h.machine.error(), None);
        assert!(h.machine.state().attempt > failed_attempt);

        assert!(matches!(h.machine.retry().await, Err(Error::AlreadyDone)));
    }

    #[tokio::test]
    async fn test_retry_without_attempt() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        assert!(matches!(h.machine.retry().await, Err(Error::NothingToRetry)));
    }

    #[tokio::test]
    async fn test_setup_after_done_rejected() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        h.machine.setup(MNEMONIC).await.unwrap();
        assert!(matches!(h.machine.setup(WIF_KEY).await, Err(Error::AlreadyDone)));
        assert_eq!(stored(&h).unwrap().kind, CredentialKind::Mnemonic);
    }

    #[tokio::test]
    async fn test_acknowledge_error() {
        let h = harness(Arc::new(ScriptedInitializer::failing_once(
            InitError::Rejected("bad checksum".into()),
        )));
        h.machine.setup(MNEMONIC).await.unwrap();
        assert!(h.machine.error().is_some());

        h.machine.acknowledge_error();
        assert_eq!(h.machine.error(), None);
        assert_eq!(h.machine.stage(), LoadStage::SettingUp);
    }

    #[tokio::test]
    async fn test_reset_clears_record_only() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        h.memory.set("currency", "BTC").unwrap();
        h.machine.setup(MNEMONIC).await.unwrap();

        h.machine.reset().unwrap();
        assert!(!h.machine.has_record());
        assert_eq!(h.machine.stage(), LoadStage::Init);
        assert!(h.machine.needs_setup());
        assert_eq!(h.machine.error(), None);
        assert_eq!(stored(&h), None);
        assert_eq!(h.memory.get(VALUE_KEY).unwrap(), None);
        assert_eq!(h.memory.get("currency").unwrap().as_deref(), Some("BTC"));
        assert_eq!(h.nav.last().as_deref(), Some("/setup"));
    }

    #[tokio::test]
    async fn test_reset_wipes_all_storage_when_flagged() {
        let flags = FeatureFlags {
            reset_clears_all_storage: true,
            ..FeatureFlags::default()
        };
        let h = harness_with(Arc::new(ScriptedInitializer::default()), flags);
        h.memory.set("currency", "BTC").unwrap();
        h.machine.setup(MNEMONIC).await.unwrap();

        h.machine.reset().unwrap();
        assert!(h.memory.is_empty());
    }

    #[tokio::test]
    async fn test_reset_storage_failure_still_resets() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        h.machine.setup(MNEMONIC).await.unwrap();
        h.memory.set_available(false);

        assert!(matches!(
            h.machine.reset(),
            Err(Error::Storage(StorageError::Unavailable))
        ));
        assert_eq!(h.machine.stage(), LoadStage::Init);
        let error = h.machine.error().unwrap();
        assert_eq!(error.occurred_during, LoadStage::Init);
        assert_eq!(error.source, FailureSource::Storage);
    }

    #[tokio::test]
    async fn test_local_key_mode_skips_backend_for_keys() {
        let flags = FeatureFlags {
            local_key_mode: true,
            ..FeatureFlags::default()
        };
        let init = Arc::new(ScriptedInitializer::default());
        let h = harness_with(init.clone(), flags.clone());

        assert_eq!(h.machine.setup(WIF_KEY).await.unwrap(), AttemptOutcome::Ready);
        assert_eq!(init.init_calls(), 0);

        let init = Arc::new(ScriptedInitializer::default());
        let h = harness_with(init.clone(), flags);
        assert_eq!(h.machine.setup(MNEMONIC).await.unwrap(), AttemptOutcome::Ready);
        assert_eq!(init.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let h = harness(Arc::new(ScriptedInitializer::default()));
        let mut rx = h.machine.subscribe();
        assert_eq!(rx.borrow().stage, LoadStage::Init);

        h.machine.setup(MNEMONIC).await.unwrap();
        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.stage, LoadStage::Done);
        assert!(state.is_ready());
        assert_eq!(state, h.machine.state());
    }

    #[tokio::test]
    async fn test_second_setup_wins_when_first_would_succeed() {
        let (init, mut entered) = GatedInitializer::new();
        let gate_first = init.gate(MNEMONIC);
        let gate_second = init.gate(WIF_KEY);
        let h = harness(init);

        let first = h.machine.spawn_setup(MNEMONIC);
        assert_eq!(entered.recv().await.as_deref(), Some(MNEMONIC));

        let second = h.machine.spawn_setup(WIF_KEY);
        assert_eq!(entered.recv().await.as_deref(), Some(WIF_KEY));

        // First backend call resolves late; its result must not apply
        let _ = gate_first.send(Ok(()));
        assert_eq!(first.await.unwrap().unwrap(), AttemptOutcome::Superseded);

        gate_second
            .send(Err(InitError::Rejected("bad key".into())))
            .unwrap();
        let outcome = second.await.unwrap().unwrap();
        assert!(matches!(outcome, AttemptOutcome::Failed(InitError::Rejected(_))));

        assert_eq!(h.machine.stage(), LoadStage::SettingUp);
        assert!(h.machine.error().is_some());
        assert_eq!(stored(&h).unwrap().kind, CredentialKind::WifKey);
        assert!(h.nav.paths().is_empty());
    }

    #[tokio::test]
    async fn test_second_setup_wins_when_it_resolves_first() {
        let (init, mut entered) = GatedInitializer::new();
        let gate_first = init.gate(MNEMONIC);
        let gate_second = init.gate(WIF_KEY);
        let h = harness(init);

        let first = h.machine.spawn_setup(MNEMONIC);
        assert_eq!(entered.recv().await.as_deref(), Some(MNEMONIC));
        let second = h.machine.spawn_setup(WIF_KEY);
        assert_eq!(entered.recv().await.as_deref(), Some(WIF_KEY));

        gate_second.send(Ok(())).unwrap();
        assert_eq!(second.await.unwrap().unwrap(), AttemptOutcome::Ready);

        let _ = gate_first.send(Err(InitError::Backend("late".into())));
        assert_eq!(first.await.unwrap().unwrap(), AttemptOutcome::Superseded);

        assert_eq!(h.machine.stage(), LoadStage::Done);
        assert_eq!(h.machine.error(), None);
        assert_eq!(h.nav.paths(), vec!["/"]);
    }

    #[tokio::test]
    async fn test_reset_supersedes_in_flight_attempt() {
        let (init, mut entered) = GatedInitializer::new();
        let gate = init.gate(MNEMONIC);
        let h = harness(init);

        let attempt = h.machine.spawn_setup(MNEMONIC);
        assert_eq!(entered.recv().await.as_deref(), Some(MNEMONIC));

        h.machine.reset().unwrap();
        let _ = gate.send(Ok(()));
        assert_eq!(attempt.await.unwrap().unwrap(), AttemptOutcome::Superseded);

        assert_eq!(h.machine.stage(), LoadStage::Init);
        assert_eq!(stored(&h), None);
        assert_eq!(h.nav.paths(), vec!["/setup"]);
    }
}
