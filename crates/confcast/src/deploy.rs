use crate::rpc::RpcError;
use crate::value::Value;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid environment selection")]
    Invalid,
    #[error("nothing to deploy")]
    Missing,
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("push worker aborted: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

/// Fully-qualified name a variable is stored under in a replica.
///
/// Non-empty fragments are trimmed, joined with `_` and upper-cased; the
/// separator is never doubled. Stable under re-invocation, and identical
/// for the writer (release) and the reader (client).
pub fn key(parts: &[&str]) -> String {
    let mut k = String::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if !k.is_empty() {
            k.push('_');
        }
        k.push_str(part);
    }
    k.to_uppercase()
}

/// Counters of the changes a release will perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Task {
    pub add: u64,
    pub del: u64,
    pub upd: u64,
    pub noop: u64,
}

impl Task {
    /// Sum of all classified entries.
    pub fn all(&self) -> u64 {
        self.add + self.del + self.upd + self.noop
    }

    pub fn pct_of_add(&self) -> u64 {
        self.percent_of(self.add)
    }

    pub fn pct_of_del(&self) -> u64 {
        self.percent_of(self.del)
    }

    pub fn pct_of_upd(&self) -> u64 {
        self.percent_of(self.upd)
    }

    pub fn pct_of_noop(&self) -> u64 {
        self.percent_of(self.noop)
    }

    fn percent_of(&self, n: u64) -> u64 {
        match self.all() {
            0 => 0,
            all => n * 100 / all,
        }
    }
}

/// Read contract a deployable project satisfies.
///
/// `envs_values` returns the full value sets the project declares for each
/// dimension, the singleton `[""]` standing in for an absent dimension.
/// `to_deploy` materialises variables across the selected env combinations,
/// a `Null` value marking a variable tombstoned by the catalog.
pub trait Source: Send + Sync {
    fn key(&self) -> &str;
    fn envs_values(&self) -> (Vec<String>, Vec<String>);
    fn to_deploy(&self, env1: &[String], env2: &[String]) -> HashMap<String, Value>;
}

/// Request/response caller a release writes through.
///
/// Implemented by [`crate::rpc::RpcClient`], by [`Serverless`] and by test
/// fakes.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Current value behind the key, or a miss.
    async fn lookup(&self, key: &str) -> Option<Value>;

    /// Apply the whole batch, `Null` values deleting their key.
    async fn bulk(&self, batch: HashMap<String, Value>) -> Result<(), RpcError>;
}

/// Sentinel endpoint for pushes that skip the diff step: every lookup
/// misses, so the whole catalog classifies as additions, and every write
/// is accepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct Serverless;

#[async_trait]
impl Endpoint for Serverless {
    async fn lookup(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn bulk(&self, _batch: HashMap<String, Value>) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Classify the variables to deploy against the values currently served.
fn classify(
    src: &HashMap<String, Value>,
    dst: &HashMap<String, Value>,
) -> (HashMap<String, Value>, Task) {
    let mut dep = HashMap::new();
    let mut task = Task::default();
    for (k, sv) in src {
        match dst.get(k) {
            None => {
                dep.insert(k.clone(), sv.clone());
                task.add += 1;
            }
            Some(_) if sv.is_null() => {
                dep.insert(k.clone(), Value::Null);
                task.del += 1;
            }
            Some(dv) if dv != sv => {
                dep.insert(k.clone(), sv.clone());
                task.upd += 1;
            }
            Some(_) => task.noop += 1,
        }
    }
    (dep, task)
}

/// A single-use deployment plan from a project source to its replicas.
///
/// Lifecycle: `checkout` the env selection, then `diff`/`status` to inspect
/// the plan, then `push` to fan it out. The merge runs once and is cached;
/// there is no un-push.
pub struct Release {
    source: Arc<dyn Source>,
    to: Vec<Arc<dyn Endpoint>>,
    env1: Vec<String>,
    env2: Vec<String>,
    src: HashMap<String, Value>,
    dst: HashMap<String, Value>,
    dep: Option<HashMap<String, Value>>,
    task: Task,
    pushed: Option<HashMap<String, Value>>,
}

impl Release {
    /// Build a release targeting the primary endpoint plus any extras.
    ///
    /// The primary is both a write target and the single reference
    /// consulted by the diff. Inject [`Serverless`] as primary to force a
    /// full push.
    pub fn new(
        source: Arc<dyn Source>,
        primary: Arc<dyn Endpoint>,
        more: Vec<Arc<dyn Endpoint>>,
    ) -> Self {
        let mut to = Vec::with_capacity(1 + more.len());
        to.push(primary);
        to.extend(more);
        Self {
            source,
            to,
            env1: Vec::new(),
            env2: Vec::new(),
            src: HashMap::new(),
            dst: HashMap::new(),
            dep: None,
            task: Task::default(),
            pushed: None,
        }
    }

    /// Number of replicas the release writes to.
    pub fn replicate(&self) -> usize {
        self.to.len()
    }

    /// Select the env-value slices scoping the release.
    ///
    /// Accepts zero, one or two dimensions; every selected value must
    /// belong to the declared set of its dimension, and at least as many
    /// dimensions must be supplied as the project declares. Unused
    /// dimensions are filled with the empty singleton.
    pub fn checkout(&mut self, envs: &[Vec<String>]) -> Result<(), DeployError> {
        let (declared1, declared2) = self.source.envs_values();
        let declared = match (declared1.first(), declared2.first()) {
            (None, _) | (_, None) => 0,
            (Some(a), Some(b)) if a.is_empty() && b.is_empty() => 0,
            (Some(a), Some(b)) if !a.is_empty() && b.is_empty() => 1,
            _ => 2,
        };
        let supplied = envs.iter().filter(|e| !e.is_empty()).count();
        if supplied < declared || supplied > 2 {
            return Err(DeployError::Invalid);
        }
        match supplied {
            2 => {
                if !contained(&envs[1], &declared2) || !contained(&envs[0], &declared1) {
                    return Err(DeployError::Invalid);
                }
                self.env1 = envs[0].clone();
                self.env2 = envs[1].clone();
            }
            1 => {
                if !contained(&envs[0], &declared1) {
                    return Err(DeployError::Invalid);
                }
                self.env1 = envs[0].clone();
                self.env2 = vec![String::new()];
            }
            _ => {
                self.env1 = vec![String::new()];
                self.env2 = vec![String::new()];
            }
        }
        Ok(())
    }

    /// The plan: every key whose value differs from the reference replica.
    pub async fn diff(&mut self) -> HashMap<String, Value> {
        self.merge().await;
        self.dep.clone().unwrap_or_default()
    }

    /// Counters over the plan classification.
    pub async fn status(&mut self) -> Task {
        self.merge().await;
        self.task
    }

    /// Values of the first environment used to checkout the release.
    pub fn first_env_values(&self) -> &[String] {
        &self.env1
    }

    /// Values of the second environment used to checkout the release.
    pub fn second_env_values(&self) -> &[String] {
        &self.env2
    }

    /// Fan the plan out to every replica as one bulk each.
    ///
    /// An empty plan fails with `Missing`. A non-empty `only` restricts the
    /// plan to those variable names, expanded across every selected env
    /// combination; entries the diff classified as no-ops are never pushed.
    /// Replicas are written in parallel and the first error observed is
    /// surfaced; partial success is not rolled back.
    pub async fn push(&mut self, only: &[&str]) -> Result<(), DeployError> {
        self.merge().await;
        let dep = match self.dep.as_ref() {
            Some(dep) if !dep.is_empty() => dep,
            _ => return Err(DeployError::Missing),
        };
        let plan: HashMap<String, Value> = if only.is_empty() {
            dep.clone()
        } else {
            let allowed = self.rebase(only);
            dep.iter()
                .filter(|(k, _)| allowed.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        };
        if plan.is_empty() {
            return Err(DeployError::Missing);
        }

        info!(
            keys = plan.len(),
            replicas = self.to.len(),
            "pushing release"
        );
        let mut workers = JoinSet::new();
        for endpoint in &self.to {
            let endpoint = Arc::clone(endpoint);
            let batch = plan.clone();
            workers.spawn(async move { endpoint.bulk(batch).await });
        }
        let mut first_err: Option<DeployError> = None;
        while let Some(joined) = workers.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome.map_err(DeployError::from),
                Err(join_err) => Err(DeployError::from(join_err)),
            };
            if let Err(e) = outcome {
                debug!("replica push failed: {}", e);
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        if let Some(e) = first_err {
            return Err(e);
        }
        self.pushed = Some(plan);
        Ok(())
    }

    /// Before/after pairs for every key of the pushed plan.
    ///
    /// Only meaningful after a successful push; the before value is absent
    /// for keys the reference replica did not hold.
    pub fn log(&self) -> Option<HashMap<String, (Option<Value>, Value)>> {
        let pushed = self.pushed.as_ref()?;
        let mut out = HashMap::with_capacity(pushed.len());
        for (k, after) in pushed {
            out.insert(k.clone(), (self.dst.get(k).cloned(), after.clone()));
        }
        Some(out)
    }

    /// Compute the plan once; later calls reuse the cached result.
    async fn merge(&mut self) {
        if self.dep.is_some() {
            return;
        }
        self.src = self.source.to_deploy(&self.env1, &self.env2);
        if self.src.is_empty() {
            self.dep = Some(HashMap::new());
            return;
        }
        self.dst = self.fetch().await;
        let (dep, task) = classify(&self.src, &self.dst);
        self.task = task;
        self.dep = Some(dep);
    }

    /// Snapshot current values from the reference replica, one concurrent
    /// lookup per key. Unknown keys are simply absent from the result.
    async fn fetch(&self) -> HashMap<String, Value> {
        let mut lookups = JoinSet::new();
        for k in self.src.keys().cloned() {
            let reference = Arc::clone(&self.to[0]);
            lookups.spawn(async move {
                let found = reference.lookup(&k).await;
                (k, found)
            });
        }
        let mut dst = HashMap::new();
        while let Some(joined) = lookups.join_next().await {
            if let Ok((k, Some(v))) = joined {
                dst.insert(k, v);
            }
        }
        dst
    }

    /// Expand bare variable names into the authorised set of deploy keys
    /// across every selected env combination.
    fn rebase(&self, only: &[&str]) -> HashSet<String> {
        let project = self.source.key().to_string();
        let mut allowed = HashSet::new();
        for name in only {
            for e1 in &self.env1 {
                for e2 in &self.env2 {
                    allowed.insert(key(&[&project, e1, e2, name]));
                }
            }
        }
        allowed
    }
}

fn contained(selected: &[String], declared: &[String]) -> bool {
    let set: HashSet<&str> = declared.iter().map(String::as_str).collect();
    selected.iter().all(|v| set.contains(v.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[test]
    fn test_key_joins_and_uppercases() {
        assert_eq!(key(&["eve", "qa", "fr", "bool"]), "EVE_QA_FR_BOOL");
        assert_eq!(key(&["p", "", "", "name"]), "P_NAME");
        assert_eq!(key(&[" p ", "x"]), "P_X");
        assert_eq!(key(&["", ""]), "");
    }

    #[test]
    fn test_task_percentages() {
        let task = Task {
            add: 1,
            del: 0,
            upd: 1,
            noop: 2,
        };
        assert_eq!(task.all(), 4);
        assert_eq!(task.pct_of_add(), 25);
        assert_eq!(task.pct_of_del(), 0);
        assert_eq!(task.pct_of_upd(), 25);
        assert_eq!(task.pct_of_noop(), 50);

        assert_eq!(Task::default().pct_of_add(), 0);
    }

    /// Project with envs `{qa,prod} x {fr,en}` declaring the given
    /// variables for every cell.
    struct TestSource {
        id: &'static str,
        env1: Vec<String>,
        env2: Vec<String>,
        vars: Vec<(&'static str, Value)>,
    }

    impl TestSource {
        fn new(vars: Vec<(&'static str, Value)>) -> Self {
            Self {
                id: "p",
                env1: vec!["qa".to_string(), "prod".to_string()],
                env2: vec!["fr".to_string(), "en".to_string()],
                vars,
            }
        }
    }

    impl Source for TestSource {
        fn key(&self) -> &str {
            self.id
        }

        fn envs_values(&self) -> (Vec<String>, Vec<String>) {
            (self.env1.clone(), self.env2.clone())
        }

        fn to_deploy(&self, env1: &[String], env2: &[String]) -> HashMap<String, Value> {
            let mut out = HashMap::new();
            for e1 in env1 {
                for e2 in env2 {
                    for (name, value) in &self.vars {
                        out.insert(key(&[self.id, e1, e2, name]), value.clone());
                    }
                }
            }
            out
        }
    }

    #[derive(Default)]
    struct FakeEndpoint {
        data: Mutex<HashMap<String, Value>>,
        fail_bulk: bool,
        batches: Mutex<Vec<HashMap<String, Value>>>,
    }

    impl FakeEndpoint {
        fn with_data(data: HashMap<String, Value>) -> Self {
            Self {
                data: Mutex::new(data),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail_bulk: true,
                ..Default::default()
            }
        }

        fn value(&self, key: &str) -> Option<Value> {
            self.data.lock().unwrap().get(key).cloned()
        }

        fn batches(&self) -> Vec<HashMap<String, Value>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Endpoint for FakeEndpoint {
        async fn lookup(&self, key: &str) -> Option<Value> {
            self.data.lock().unwrap().get(key).cloned()
        }

        async fn bulk(&self, batch: HashMap<String, Value>) -> Result<(), RpcError> {
            if self.fail_bulk {
                return Err(RpcError::Failure);
            }
            self.batches.lock().unwrap().push(batch.clone());
            let mut data = self.data.lock().unwrap();
            for (k, v) in batch {
                if v.is_null() {
                    data.remove(&k);
                } else {
                    data.insert(k, v);
                }
            }
            Ok(())
        }
    }

    fn release_over(
        source: TestSource,
        primary: Arc<FakeEndpoint>,
        more: Vec<Arc<FakeEndpoint>>,
    ) -> Release {
        Release::new(
            Arc::new(source),
            primary as Arc<dyn Endpoint>,
            more.into_iter().map(|e| e as Arc<dyn Endpoint>).collect(),
        )
    }

    #[tokio::test]
    async fn test_checkout_rejects_unknown_value() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let mut release = release_over(source, Arc::new(FakeEndpoint::default()), vec![]);
        let err = release
            .checkout(&[vec!["qa".to_string()], vec!["it".to_string()]])
            .unwrap_err();
        assert!(matches!(err, DeployError::Invalid));
    }

    #[tokio::test]
    async fn test_checkout_rejects_missing_dimension() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let mut release = release_over(source, Arc::new(FakeEndpoint::default()), vec![]);
        // The project declares two dimensions; selecting only one is not
        // enough.
        let err = release.checkout(&[vec!["qa".to_string()]]).unwrap_err();
        assert!(matches!(err, DeployError::Invalid));
    }

    #[tokio::test]
    async fn test_checkout_fills_unused_dimensions() {
        struct Flat;
        impl Source for Flat {
            fn key(&self) -> &str {
                "p"
            }
            fn envs_values(&self) -> (Vec<String>, Vec<String>) {
                (vec![String::new()], vec![String::new()])
            }
            fn to_deploy(&self, _: &[String], _: &[String]) -> HashMap<String, Value> {
                HashMap::new()
            }
        }
        let mut release = Release::new(
            Arc::new(Flat),
            Arc::new(FakeEndpoint::default()) as Arc<dyn Endpoint>,
            vec![],
        );
        release.checkout(&[]).unwrap();
        assert_eq!(release.first_env_values(), [String::new()]);
        assert_eq!(release.second_env_values(), [String::new()]);
    }

    #[tokio::test]
    async fn test_status_classifies_addition_on_empty_replica() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let primary = Arc::new(FakeEndpoint::default());
        let mut release = release_over(source, Arc::clone(&primary), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        let task = release.status().await;
        assert_eq!(
            task,
            Task {
                add: 1,
                del: 0,
                upd: 0,
                noop: 0
            }
        );

        release.push(&[]).await.unwrap();
        assert_eq!(primary.value("P_QA_FR_BOOL"), Some(Value::Bool(true)));

        let log = release.log().unwrap();
        assert_eq!(log["P_QA_FR_BOOL"], (None, Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_push_updates_changed_value() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let primary = Arc::new(FakeEndpoint::with_data(HashMap::from([(
            "P_QA_FR_BOOL".to_string(),
            Value::Bool(false),
        )])));
        let mut release = release_over(source, Arc::clone(&primary), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        let task = release.status().await;
        assert_eq!(task.upd, 1);
        assert_eq!(task.all(), 1);

        release.push(&[]).await.unwrap();
        assert_eq!(primary.value("P_QA_FR_BOOL"), Some(Value::Bool(true)));

        let log = release.log().unwrap();
        assert_eq!(
            log["P_QA_FR_BOOL"],
            (Some(Value::Bool(false)), Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_tombstone_classifies_as_deletion() {
        let source = TestSource::new(vec![("GONE", Value::Null)]);
        let primary = Arc::new(FakeEndpoint::with_data(HashMap::from([(
            "P_QA_FR_GONE".to_string(),
            Value::Int(1),
        )])));
        let mut release = release_over(source, Arc::clone(&primary), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        assert_eq!(release.status().await.del, 1);
        release.push(&[]).await.unwrap();
        assert_eq!(primary.value("P_QA_FR_GONE"), None);
    }

    #[tokio::test]
    async fn test_noop_only_plan_is_missing() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let primary = Arc::new(FakeEndpoint::with_data(HashMap::from([(
            "P_QA_FR_BOOL".to_string(),
            Value::Bool(true),
        )])));
        let mut release = release_over(source, Arc::clone(&primary), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        assert_eq!(release.status().await.noop, 1);
        let err = release.push(&[]).await.unwrap_err();
        assert!(matches!(err, DeployError::Missing));
        assert!(release.log().is_none());
    }

    #[tokio::test]
    async fn test_scoped_push_filters_by_name() {
        let source = TestSource::new(vec![
            ("BOOL", Value::Bool(true)),
            ("STR", Value::Text("rv".to_string())),
        ]);
        let primary = Arc::new(FakeEndpoint::default());
        let mut release = release_over(source, Arc::clone(&primary), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        release.push(&["BOOL"]).await.unwrap();
        assert_eq!(primary.value("P_QA_FR_BOOL"), Some(Value::Bool(true)));
        assert_eq!(primary.value("P_QA_FR_STR"), None);

        let batches = primary.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_push_with_unknown_name_is_missing() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let mut release = release_over(source, Arc::new(FakeEndpoint::default()), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        let err = release.push(&["OTHER"]).await.unwrap_err();
        assert!(matches!(err, DeployError::Missing));
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_replica() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let primary = Arc::new(FakeEndpoint::default());
        let second = Arc::new(FakeEndpoint::default());
        let mut release = release_over(source, Arc::clone(&primary), vec![Arc::clone(&second)]);
        assert_eq!(release.replicate(), 2);

        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();
        release.push(&[]).await.unwrap();

        assert_eq!(primary.value("P_QA_FR_BOOL"), Some(Value::Bool(true)));
        assert_eq!(second.value("P_QA_FR_BOOL"), Some(Value::Bool(true)));
    }

    #[tokio::test]
    async fn test_first_replica_error_is_surfaced() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let primary = Arc::new(FakeEndpoint::default());
        let broken = Arc::new(FakeEndpoint::failing());
        let mut release = release_over(source, Arc::clone(&primary), vec![broken]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        let err = release.push(&[]).await.unwrap_err();
        assert!(matches!(err, DeployError::Rpc(RpcError::Failure)));
        assert!(release.log().is_none());
    }

    #[tokio::test]
    async fn test_serverless_primary_forces_full_push() {
        let source = TestSource::new(vec![("BOOL", Value::Bool(true))]);
        let mirror = Arc::new(FakeEndpoint::with_data(HashMap::from([(
            "P_QA_FR_BOOL".to_string(),
            Value::Bool(true),
        )])));
        let mut release = Release::new(
            Arc::new(source),
            Arc::new(Serverless) as Arc<dyn Endpoint>,
            vec![Arc::clone(&mirror) as Arc<dyn Endpoint>],
        );
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        // The sentinel never reports current values, so even an up-to-date
        // mirror classifies as an addition and gets the write.
        assert_eq!(release.status().await.add, 1);
        release.push(&[]).await.unwrap();
        assert_eq!(mirror.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_catalog_is_missing() {
        let source = TestSource::new(vec![]);
        let mut release = release_over(source, Arc::new(FakeEndpoint::default()), vec![]);
        release
            .checkout(&[vec!["qa".to_string()], vec!["fr".to_string()]])
            .unwrap();

        assert_eq!(release.status().await.all(), 0);
        let err = release.push(&[]).await.unwrap_err();
        assert!(matches!(err, DeployError::Missing));
    }

    fn value_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            any::<i32>().prop_map(|i| Value::Float(f64::from(i))),
            "[a-z]{0,8}".prop_map(Value::Text),
        ]
    }

    proptest! {
        #[test]
        fn prop_classification_accounts_for_every_key(
            src in proptest::collection::hash_map("[A-Z]{1,6}", value_strategy(), 0..32),
            dst in proptest::collection::hash_map("[A-Z]{1,6}", value_strategy(), 0..32),
        ) {
            let (dep, task) = classify(&src, &dst);
            prop_assert_eq!(task.all(), src.len() as u64);
            prop_assert_eq!(dep.len() as u64, task.add + task.del + task.upd);
            for k in dep.keys() {
                prop_assert!(src.contains_key(k));
            }
        }

        #[test]
        fn prop_key_shape(parts in proptest::collection::vec("[ a-zA-Z0-9]{0,6}", 0..6)) {
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let k = key(&refs);
            prop_assert_eq!(k.clone(), key(&refs));
            prop_assert!(!k.starts_with('_'));
            prop_assert!(!k.ends_with('_'));
            prop_assert!(!k.contains("__"));
            prop_assert_eq!(k.clone(), k.to_uppercase());
        }
    }
}
