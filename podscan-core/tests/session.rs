mod support;

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use podscan_core::{
    DeleteJobPolicy, DispatchPolicy, NamespaceScope, ScanConfig, ScanError, ScanScope,
    model::{ScanId, SessionStatus},
};
use support::{
    DIGEST_A, FakeCluster, FakeLauncher, controller, next_launch, pod, report_for,
    wait_until_finished,
};

fn config(max_parallelism: usize, result_timeout: Duration) -> ScanConfig {
    ScanConfig {
        scope: ScanScope::new(NamespaceScope::All),
        policy: DispatchPolicy {
            max_parallelism,
            result_timeout,
            delete_job_policy: DeleteJobPolicy::Successful,
            ..DispatchPolicy::default()
        },
    }
}

fn two_images_three_pods() -> FakeCluster {
    FakeCluster::with_pods(vec![
        pod("web-0", "default", &[("web", "nginx:1.25")]),
        pod("web-1", "default", &[("web", "nginx:1.25")]),
        pod("cache-0", "default", &[("redis", "redis:7")]),
    ])
}

#[tokio::test]
async fn shared_image_is_scanned_once_and_expanded_per_pod() {
    let (launcher, mut launches) = FakeLauncher::new();
    let controller = controller(two_images_three_pods(), launcher.clone());

    let handle = controller
        .scan(&config(10, Duration::from_secs(5)))
        .await
        .expect("scan starts");
    assert_eq!(handle.images_to_scan, 2);
    assert_eq!(controller.status().await, SessionStatus::Scanning);

    let first = next_launch(&mut launches).await;
    let second = next_launch(&mut launches).await;
    let images: HashSet<_> = [first.image.clone(), second.image.clone()].into();
    assert_eq!(images, HashSet::from(["nginx:1.25".to_string(), "redis:7".to_string()]));
    assert_ne!(first.scan_id, second.scan_id);

    controller
        .submit_result(report_for(&first, true))
        .await
        .expect("first result accepted");
    controller
        .submit_result(report_for(&second, true))
        .await
        .expect("second result accepted");

    let progress = wait_until_finished(&controller).await;
    assert_eq!(progress.images_to_scan, 2);
    assert_eq!(progress.images_completed_to_scan, 2);

    let summary = handle.join().await.expect("dispatcher joins");
    assert_eq!(summary.completed, 2);

    let results = controller.results().await;
    assert_eq!(results.image_scan_results.len(), 3);
    let nginx_rows: Vec<_> = results
        .image_scan_results
        .iter()
        .filter(|row| row.image_name == "nginx:1.25")
        .collect();
    assert_eq!(nginx_rows.len(), 2);
    assert!(nginx_rows.iter().all(|row| row.success));
    assert!(
        results
            .image_scan_results
            .iter()
            .all(|row| row.image_hash.as_deref() == Some(DIGEST_A))
    );

    assert_eq!(launcher.removed().len(), 2);
    assert!(launches.try_recv().is_err());
}

#[tokio::test]
async fn admission_limit_holds_back_second_launch() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![
        pod("a-0", "default", &[("a", "app-a:1")]),
        pod("b-0", "default", &[("b", "app-b:1")]),
    ]);
    let controller = controller(cluster, launcher);

    controller
        .scan(&config(1, Duration::from_secs(5)))
        .await
        .expect("scan starts");

    let first = next_launch(&mut launches).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(launches.try_recv().is_err(), "second launch must wait for a free slot");

    let progress = controller.progress().await;
    assert_eq!(progress.images_started_to_scan, 1);
    assert_eq!(progress.images_completed_to_scan, 0);

    controller
        .submit_result(report_for(&first, true))
        .await
        .expect("first result accepted");

    let second = next_launch(&mut launches).await;
    assert_ne!(second.image, first.image);
    controller
        .submit_result(report_for(&second, false))
        .await
        .expect("second result accepted");

    wait_until_finished(&controller).await;
}

#[tokio::test]
async fn stale_and_duplicate_results_leave_the_record_alone() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![pod("web-0", "default", &[("web", "nginx")])]);
    let controller = controller(cluster, launcher);
    controller
        .scan(&config(1, Duration::from_secs(5)))
        .await
        .expect("scan starts");
    let request = next_launch(&mut launches).await;

    let mut stale = report_for(&request, true);
    stale.scan_uuid = ScanId::new().to_string();
    let err = controller.submit_result(stale).await.unwrap_err();
    assert!(matches!(err, ScanError::StaleResult { .. }));
    assert!(controller.results().await.image_scan_results.is_empty());

    controller
        .submit_result(report_for(&request, false))
        .await
        .expect("matching result accepted");

    let err = controller
        .submit_result(report_for(&request, true))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::DuplicateResult { .. }));

    wait_until_finished(&controller).await;
    let results = controller.results().await;
    assert_eq!(results.image_scan_results.len(), 1);
    assert!(!results.image_scan_results[0].success);
}

#[tokio::test]
async fn clear_then_scan_issues_fresh_ids_and_rejects_old_results() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![pod("web-0", "default", &[("web", "nginx")])]);
    let controller = controller(cluster, launcher);

    controller
        .scan(&config(1, Duration::from_secs(5)))
        .await
        .expect("first scan starts");
    let old = next_launch(&mut launches).await;

    controller.clear().await;
    assert_eq!(controller.status().await, SessionStatus::Idle);
    assert_eq!(controller.progress().await.images_to_scan, 0);

    controller
        .scan(&config(1, Duration::from_secs(5)))
        .await
        .expect("second scan starts");
    let fresh = next_launch(&mut launches).await;
    assert_eq!(fresh.image, old.image);
    assert_ne!(fresh.scan_id, old.scan_id);

    let err = controller
        .submit_result(report_for(&old, true))
        .await
        .unwrap_err();
    assert!(err.is_discarded_result());

    controller
        .submit_result(report_for(&fresh, true))
        .await
        .expect("fresh result accepted");
    let progress = wait_until_finished(&controller).await;
    assert_eq!(progress.images_to_scan, 1);
    assert_eq!(controller.results().await.image_scan_results.len(), 1);
}

#[tokio::test]
async fn unknown_image_is_rejected_without_touching_counters() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![pod("web-0", "default", &[("web", "nginx")])]);
    let controller = controller(cluster, launcher);
    controller
        .scan(&config(1, Duration::from_secs(5)))
        .await
        .expect("scan starts");
    let request = next_launch(&mut launches).await;
    let before = controller.progress().await;

    let mut unknown = report_for(&request, true);
    unknown.image = "busybox".into();
    let err = controller.submit_result(unknown).await.unwrap_err();

    assert!(matches!(err, ScanError::UnknownImage(_)));
    assert!(!err.is_discarded_result());
    assert_eq!(controller.progress().await, before);
}

#[tokio::test]
async fn launch_failure_becomes_a_failed_row() {
    let (launcher, mut launches) = FakeLauncher::failing(&["broken:1"]);
    let cluster = FakeCluster::with_pods(vec![
        pod("broken-0", "default", &[("app", "broken:1")]),
        pod("web-0", "default", &[("web", "nginx")]),
    ]);
    let controller = controller(cluster, launcher);
    let handle = controller
        .scan(&config(2, Duration::from_secs(5)))
        .await
        .expect("scan starts");

    let request = next_launch(&mut launches).await;
    assert_eq!(request.image, "nginx");
    controller
        .submit_result(report_for(&request, true))
        .await
        .expect("result accepted");

    wait_until_finished(&controller).await;
    let summary = handle.join().await.expect("dispatcher joins");
    assert_eq!(summary.launch_failures, 1);

    let results = controller.results().await;
    assert_eq!(results.image_scan_results.len(), 2);
    let failed: Vec<_> = results.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].image_name, "broken:1");
    assert_eq!(failed[0].pod_name, "broken-0");
}

#[tokio::test]
async fn late_result_after_timeout_is_still_recorded() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![pod("web-0", "default", &[("web", "nginx")])]);
    let controller = controller(cluster, launcher.clone());
    let handle = controller
        .scan(&config(1, Duration::from_millis(30)))
        .await
        .expect("scan starts");
    let request = next_launch(&mut launches).await;

    let progress = wait_until_finished(&controller).await;
    assert_eq!(progress.images_completed_to_scan, 1);
    let summary = handle.join().await.expect("dispatcher joins");
    assert_eq!(summary.timed_out, 1);
    assert!(controller.results().await.image_scan_results.is_empty());
    assert!(launcher.removed().is_empty());

    controller
        .submit_result(report_for(&request, true))
        .await
        .expect("late result accepted");
    let results = controller.results().await;
    assert_eq!(results.image_scan_results.len(), 1);
    assert_eq!(results.progress, progress);
}

#[tokio::test]
async fn namespace_scope_and_ignore_rules_shape_the_session() {
    let (launcher, mut launches) = FakeLauncher::new();
    let mut labelled = pod("skip-me", "team", &[("app", "skipped:1")]);
    labelled
        .labels
        .insert("kubeiShouldScan".into(), "false".into());
    let cluster = FakeCluster::with_pods(vec![
        pod("api-0", "team", &[("api", "api:2")]),
        labelled,
        pod("dns-0", "kube-system", &[("dns", "coredns:1")]),
    ]);
    let controller = controller(cluster, launcher);

    let scope = ScanScope::new(NamespaceScope::All).ignoring(["kube-system"]);
    let handle = controller
        .scan(&ScanConfig {
            scope,
            ..config(4, Duration::from_secs(5))
        })
        .await
        .expect("scan starts");
    assert_eq!(handle.images_to_scan, 1);

    let request = next_launch(&mut launches).await;
    assert_eq!(request.image, "api:2");
    assert_eq!(request.namespace, "team");
    assert_eq!(request.callback.url(), "http://podscan.podscan:8081/result/");
}

#[tokio::test]
async fn unreachable_cluster_fails_initialization() {
    let (launcher, _launches) = FakeLauncher::new();
    let controller = controller(FakeCluster::unreachable(), launcher);

    let err = controller
        .scan(&config(1, Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Initialization(_)));
    assert_eq!(controller.status().await, SessionStatus::InitializationFailed);
    assert!(controller.results().await.image_scan_results.is_empty());
}

#[tokio::test]
async fn clear_keeps_launched_jobs_even_when_policy_deletes_all() {
    let (launcher, mut launches) = FakeLauncher::new();
    let cluster = FakeCluster::with_pods(vec![pod("web-0", "default", &[("web", "nginx")])]);
    let controller = controller(cluster, launcher.clone());

    let mut scan = config(1, Duration::from_secs(60));
    scan.policy.delete_job_policy = DeleteJobPolicy::All;
    let handle = controller.scan(&scan).await.expect("scan starts");
    next_launch(&mut launches).await;

    controller.clear().await;
    let summary = handle.join().await.expect("dispatcher joins");

    assert_eq!(summary.abandoned, 1);
    assert!(launcher.removed().is_empty());
    assert_eq!(controller.progress().await, Default::default());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_results_keep_counters_consistent() {
    const IMAGES: usize = 20;
    let pods: Vec<_> = (0..IMAGES)
        .flat_map(|i| {
            let image = format!("app-{i}:1");
            [
                pod(&format!("a-{i}"), "default", &[("app", image.as_str())]),
                pod(&format!("b-{i}"), "default", &[("app", image.as_str())]),
            ]
        })
        .collect();
    let (launcher, mut launches) = FakeLauncher::new();
    let controller = controller(FakeCluster::with_pods(pods), launcher);

    let handle = controller
        .scan(&config(4, Duration::from_secs(10)))
        .await
        .expect("scan starts");
    assert_eq!(handle.images_to_scan as usize, IMAGES);

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let controller = controller.clone();
        let done = Arc::clone(&done);
        tokio::spawn(async move {
            let mut reads = 0usize;
            while !done.load(Ordering::Acquire) {
                let progress = controller.progress().await;
                assert!(progress.images_completed_to_scan <= progress.images_started_to_scan);
                assert!(progress.images_started_to_scan <= progress.images_to_scan);
                assert!(progress.in_flight() <= 4);

                let results = controller.results().await;
                assert!(results.image_scan_results.len() <= 2 * IMAGES);
                assert!(
                    results.progress.images_completed_to_scan
                        <= results.progress.images_started_to_scan
                );
                reads += 1;
                tokio::task::yield_now().await;
            }
            reads
        })
    };

    let mut seen = HashSet::new();
    let mut submitters = Vec::with_capacity(IMAGES);
    for _ in 0..IMAGES {
        let request = next_launch(&mut launches).await;
        assert!(seen.insert(request.image.clone()), "image launched twice");
        let controller = controller.clone();
        submitters.push(tokio::spawn(async move {
            controller.submit_result(report_for(&request, true)).await
        }));
    }
    for submitter in submitters {
        submitter
            .await
            .expect("submitter task")
            .expect("result accepted");
    }

    let progress = wait_until_finished(&controller).await;
    done.store(true, Ordering::Release);
    assert!(reader.await.expect("reader task") > 0);

    assert_eq!(progress.images_completed_to_scan as usize, IMAGES);
    let summary = handle.join().await.expect("dispatcher joins");
    assert_eq!(summary.completed, IMAGES);

    let results = controller.results().await;
    assert_eq!(results.image_scan_results.len(), 2 * IMAGES);
    assert!(results.image_scan_results.iter().all(|row| row.success));
    let pods: HashSet<_> = results
        .image_scan_results
        .iter()
        .map(|row| row.pod_name.as_str())
        .collect();
    assert_eq!(pods.len(), 2 * IMAGES);
}
