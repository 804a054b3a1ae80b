//! Whole-pass scenarios over a temporary project.

#[cfg(test)]
mod tests {
    use crate::cancellation::CancellationToken;
    use crate::collaborators::CompileReport;
    use crate::core::Stage;
    use crate::reporter::{CollectingReporter, NoOpReporter, Report, SignaledReporter};
    use crate::testing::{
        assert_all_stamped, assert_not_stamped, assert_persisted, assert_stamped, MockCollaborators,
        ProjectFixture, TestRun,
    };
    use crate::watermark::WatermarkStore;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    const AHEAD: Duration = Duration::from_secs(5);

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test]
    async fn test_fresh_checkout_checks_everything() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(10);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &["lib/f0.js"]);
        let mut pipeline = project.pipeline(&mocks);

        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert_eq!(mocks.packages.installs(), 1);
        assert_eq!(mocks.formatter.last_call(), Some(sources.clone()));
        assert_eq!(mocks.spelling.last_call(), Some(sources.clone()));
        assert_eq!(mocks.linter.last_call(), Some(sources.clone()));
        assert_eq!(mocks.tests.runs()[0].changed_files, sources);
        assert_all_stamped(pipeline.store());
        assert_stamped(pipeline.store(), Stage::Install);
        assert_persisted(pipeline.store());
        assert!(project.exists(".timestamps.json"));
    }

    #[tokio::test]
    async fn test_second_pass_without_changes_checks_nothing() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(10);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();
        let first = pipeline.store().snapshot();
        mocks.reset();

        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert_eq!(mocks.packages.installs(), 1);
        // Every stage still runs, with nothing to look at.
        assert_eq!(mocks.formatter.calls(), vec![Vec::<PathBuf>::new()]);
        assert_eq!(mocks.linter.calls(), vec![Vec::<PathBuf>::new()]);
        for stage in Stage::VERIFICATION {
            assert!(pipeline.store().watermark(stage).unwrap() > first[&stage]);
        }
    }

    #[tokio::test]
    async fn test_edit_one_of_ten() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(10);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &["test/f0.js"]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();
        mocks.reset();

        let edited = project.touch_ahead("lib/f3.ts", AHEAD);
        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert_eq!(mocks.formatter.calls(), vec![vec![edited.clone()]]);
        assert_eq!(mocks.spelling.calls(), vec![vec![edited.clone()]]);
        assert_eq!(mocks.linter.calls(), vec![vec![edited.clone()]]);
        assert_eq!(
            mocks.tests.runs().last(),
            Some(&TestRun {
                test_files: paths(&["test/f0.js"]),
                changed_files: vec![edited],
            })
        );
    }

    #[tokio::test]
    async fn test_failed_stage_keeps_its_files_stale() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(4);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        mocks.linter.set_passes(false);
        let mut pipeline = project.pipeline(&mocks);
        let reporter = CollectingReporter::new();

        let passed = pipeline.run_once(&reporter, &CancellationToken::new()).await.unwrap();

        assert!(!passed);
        assert_not_stamped(pipeline.store(), Stage::Linting);
        assert_stamped(pipeline.store(), Stage::Formatting);
        assert_eq!(reporter.len(), 4 + 2);
        assert_eq!(reporter.statuses(), vec!["Issues found".to_string()]);

        mocks.reset();
        mocks.linter.set_passes(true);
        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert_eq!(mocks.formatter.last_call(), Some(Vec::new()));
        assert_eq!(mocks.linter.last_call(), Some(sources));
        assert_stamped(pipeline.store(), Stage::Linting);
    }

    #[tokio::test]
    async fn test_cancelled_pass_stamps_nothing_and_stays_quiet() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(3);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &["test/f0.js"]);
        mocks.linter.set_passes(false);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.pre_compile(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        let token = Arc::new(CancellationToken::new());
        token.cancel("newer change");
        let sink = Arc::new(CollectingReporter::new());
        let reporter = SignaledReporter::new(sink.clone(), token.clone());
        let outputs = Some(paths(&["test/f0.js"]));

        let passed = pipeline
            .post_compile(&sources, async move { outputs }, &reporter, &token)
            .await
            .unwrap();

        assert!(!passed);
        for stage in Stage::VERIFICATION {
            assert_not_stamped(pipeline.store(), stage);
        }
        assert!(mocks.tests.runs().is_empty());
        assert!(sink.is_empty());
        // The outputs of the compile that did happen are still recorded.
        assert_eq!(
            pipeline.store().outputs(),
            &paths(&["test/f0.js"]).into_iter().collect::<BTreeSet<_>>()
        );
        assert_persisted(pipeline.store());
    }

    #[tokio::test]
    async fn test_superseded_mid_pass() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(3);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        mocks.formatter.cancel_pass_on_check();
        mocks.formatter.set_passes(false);
        let mut pipeline = project.pipeline(&mocks);
        let token = Arc::new(CancellationToken::new());
        let sink = Arc::new(CollectingReporter::new());
        let reporter = SignaledReporter::new(sink.clone(), token.clone());

        let passed = pipeline.run_once(&reporter, &token).await.unwrap();

        assert!(!passed);
        assert_not_stamped(pipeline.store(), Stage::Formatting);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_manifest_change_reinstalls_and_resets() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(5);
        project.write_aged("package.json", Duration::from_secs(7200));
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();
        assert_eq!(mocks.packages.installs(), 1);
        mocks.reset();

        project.touch_ahead("package-lock.json", AHEAD);
        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert_eq!(mocks.packages.installs(), 2);
        assert!(mocks.linter.invalidations() >= 2);
        // Every watermark was dropped, so everything is checked again.
        assert_eq!(mocks.linter.last_call(), Some(sources));
        assert_all_stamped(pipeline.store());
    }

    #[tokio::test]
    async fn test_failed_install_skips_stages() {
        let project = ProjectFixture::new();
        project.write_sources(2);
        let mocks = MockCollaborators::new();
        mocks.packages.set_succeeds(false);
        let mut pipeline = project.pipeline(&mocks);

        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(!passed);
        assert_eq!(mocks.compiler.call_count(), 0);
        assert_eq!(mocks.formatter.call_count(), 0);
        assert_not_stamped(pipeline.store(), Stage::Install);
        assert!(project.exists(".timestamps.json"));
    }

    #[tokio::test]
    async fn test_outputs_are_reconciled() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(1);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &["lib/a.js", "lib/b.js"]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        project.compiles_to(&mocks, &sources, &["lib/b.js", "lib/c.js"]);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(!project.exists("lib/a.js"));
        assert!(project.exists("lib/b.js"));
        assert_eq!(
            pipeline.store().outputs(),
            &paths(&["lib/b.js", "lib/c.js"]).into_iter().collect::<BTreeSet<_>>()
        );
        let reloaded = WatermarkStore::load(project.root()).unwrap();
        assert_eq!(reloaded.outputs().len(), 2);
    }

    #[tokio::test]
    async fn test_compile_failure_fails_tests_and_clears_outputs() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(2);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &["lib/f0.js", "test/f0.js"]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();
        let runs = mocks.tests.runs().len();

        mocks.compiler.set_report(CompileReport::failed(sources.clone()));
        project.touch_ahead("lib/f1.ts", AHEAD);
        let passed = pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert!(!passed);
        assert_eq!(mocks.tests.runs().len(), runs);
        assert!(pipeline.store().outputs().is_empty());
        assert!(!project.exists("lib/f0.js"));
        assert!(!project.exists("test/f0.js"));
        // The other stages still ran and passed.
        assert_eq!(mocks.linter.last_call(), Some(paths(&["lib/f1.ts"])));
    }

    #[tokio::test]
    async fn test_only_emitted_tests_are_offered() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(1);
        let mocks = MockCollaborators::new();
        project.compiles_to(
            &mocks,
            &sources,
            &["lib/f0.js", "test/f0.js", "test/f0.d.ts", "test/helpers/setup.js"],
        );
        let mut pipeline = project.pipeline(&mocks);

        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert_eq!(mocks.tests.runs()[0].test_files, paths(&["test/f0.js"]));
    }

    #[tokio::test]
    async fn test_non_sources_are_filtered() {
        let project = ProjectFixture::new();
        let mut inputs = project.write_sources(2);
        inputs.push(project.write_aged("lib/types.d.ts", Duration::from_secs(60)));
        inputs.push(project.write_aged("node_modules/dep/index.ts", Duration::from_secs(60)));
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &inputs, &[]);
        let mut pipeline = project.pipeline(&mocks);

        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert_eq!(mocks.linter.last_call(), Some(paths(&["lib/f0.ts", "lib/f1.ts"])));
        assert_eq!(pipeline.last_sources(), paths(&["lib/f0.ts", "lib/f1.ts"]).as_slice());
    }

    #[tokio::test]
    async fn test_spelling_includes_manifest() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(1);
        project.write_aged("package.json", Duration::from_secs(7200));
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        let mut pipeline = project.pipeline(&mocks);

        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();

        assert_eq!(mocks.spelling.last_call(), Some(paths(&["lib/f0.ts", "package.json"])));
        assert_eq!(mocks.formatter.last_call(), Some(sources));
    }

    #[tokio::test]
    async fn test_dictionary_edit_rechecks_all_spelling() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(3);
        let mocks = MockCollaborators::new();
        project.compiles_to(&mocks, &sources, &[]);
        let mut pipeline = project.pipeline(&mocks);
        pipeline.run_once(&NoOpReporter, &CancellationToken::new()).await.unwrap();
        let before = pipeline.store().watermark(Stage::Spelling).unwrap();
        mocks.reset();

        let files = pipeline.last_sources().to_vec();
        let passed = pipeline
            .recheck_spelling(&files, &NoOpReporter, &CancellationToken::new())
            .await
            .unwrap();

        assert!(passed);
        assert_eq!(mocks.spelling.calls(), vec![sources]);
        assert_eq!(mocks.formatter.call_count(), 0);
        assert!(pipeline.store().watermark(Stage::Spelling).unwrap() > before);
    }

    #[tokio::test]
    async fn test_old_toolchain_is_reported_not_fatal() {
        let project = ProjectFixture::new();
        let sources = project.write_sources(1);
        let mocks = MockCollaborators {
            toolchain: Arc::new(crate::testing::StubToolchain::new(Some("v16.0.0"))),
            ..MockCollaborators::new()
        };
        project.compiles_to(&mocks, &sources, &[]);
        let mut config = ProjectFixture::config();
        config.toolchain.minimum = Some(">=18".to_string());
        let mut pipeline = crate::pipeline::Pipeline::builder(project.root())
            .config(config)
            .collaborators(mocks.collaborators())
            .build()
            .unwrap();
        let reporter = CollectingReporter::new();

        let passed = pipeline.run_once(&reporter, &CancellationToken::new()).await.unwrap();

        assert!(passed);
        assert!(reporter
            .reports()
            .iter()
            .any(|r| matches!(r, Report::Error { message, .. } if message.contains("v16.0.0"))));
    }
}
