//! Per-mode pipeline assembly.
//!
//! The develop pipeline writes expanded, unoptimized output and recovers
//! from rejected inputs. The produce pipeline purges, minifies and
//! compresses, and aborts on the first failure.

use std::sync::Arc;

use sitepipe_core::{BuildMode, Config, Layout};
use tracing::info;

use crate::{
    clean::CleanJob,
    error::Result,
    graph::{Job, RunReport, Task},
    images::ImagesTransform,
    scripts::ScriptsTransform,
    stage::{FailurePolicy, Stage, StageKind},
    styles::{PurgeOptions, RenderedPages, StylesTransform},
    templates::{Renderer, TemplateContext, TemplateTransform},
};

/// The stages of one build mode, ready to run.
#[derive(Debug, Clone)]
pub struct Pipeline {
    layout: Layout,
    stages: Vec<Arc<Stage>>,
}

impl Pipeline {
    /// Assemble the stages for `layout`'s mode.
    ///
    /// `reload_client` is injected into rendered pages and is ignored when
    /// building for release.
    #[must_use]
    pub fn new(config: &Config, layout: Layout, reload_client: Option<&str>) -> Self {
        let release = layout.mode().is_release();
        let policy = if release {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Recover
        };
        let root = layout.root().to_path_buf();

        let mut context = TemplateContext::new().with_var("mode", layout.mode().as_str());
        for (key, value) in &config.templates.vars {
            context.insert(key, value);
        }
        let include_dirs = config
            .templates
            .include_dirs
            .iter()
            .map(|dir| layout.resolve(dir))
            .collect();
        let mut templates =
            TemplateTransform::new(Renderer::new(context, include_dirs), &config.templates.extension);
        if let Some(snippet) = reload_client.filter(|_| !release) {
            templates = templates.with_injection(snippet);
        }

        let mut styles = StylesTransform::new(&config.styles.output, config.styles.browsers.clone());
        if release {
            styles = styles
                .with_purge(PurgeOptions {
                    root: root.clone(),
                    content: config.styles.purge_content.clone(),
                    safelist: config.styles.safelist.clone(),
                    pages: Some(RenderedPages {
                        sources: config.templates.sources.clone(),
                        templates: templates.clone(),
                    }),
                })
                .minified();
        }

        let mut scripts = ScriptsTransform::new(&config.scripts.output);
        if release {
            scripts = scripts.minified();
        }

        let mut images = ImagesTransform::new();
        if release {
            images = images.optimized();
        }

        let stages = vec![
            Stage::new(StageKind::Styles, &root, config.styles.sources.clone(), layout.css_dir(), styles),
            Stage::new(StageKind::Scripts, &root, config.scripts.sources.clone(), layout.js_dir(), scripts),
            Stage::new(StageKind::Images, &root, config.images.sources.clone(), layout.img_dir(), images),
            Stage::new(
                StageKind::Templates,
                &root,
                config.templates.sources.clone(),
                layout.output_dir(),
                templates,
            ),
        ]
        .into_iter()
        .map(|stage| Arc::new(stage.with_policy(policy)))
        .collect();

        Self { layout, stages }
    }

    #[must_use]
    pub fn mode(&self) -> BuildMode {
        self.layout.mode()
    }

    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[must_use]
    pub fn stages(&self) -> &[Arc<Stage>] {
        &self.stages
    }

    /// The stage of the given kind.
    #[must_use]
    pub fn stage(&self, kind: StageKind) -> Option<Arc<Stage>> {
        self.stages.iter().find(|s| s.kind() == kind).cloned()
    }

    /// Look a stage up by name.
    #[must_use]
    pub fn stage_named(&self, name: &str) -> Option<Arc<Stage>> {
        self.stages.iter().find(|s| s.name() == name).cloned()
    }

    /// Every stage as one parallel group.
    #[must_use]
    pub fn build_task(&self) -> Task {
        Task::parallel(
            self.stages
                .iter()
                .map(|stage| Task::from(Arc::clone(stage) as Arc<dyn Job>)),
        )
    }

    /// Clean the output root, then build every stage.
    #[must_use]
    pub fn task(&self) -> Task {
        Task::series([
            Task::job(CleanJob::new(self.layout.output_dir())),
            self.build_task(),
        ])
    }

    /// Run [`Pipeline::task`] to completion.
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            mode = %self.mode(),
            output = %self.layout.output_dir().display(),
            "running pipeline"
        );
        self.task().run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(mode: BuildMode) -> Pipeline {
        let config = Config::default();
        let layout = Layout::new("/site", &config, mode);
        Pipeline::new(&config, layout, Some("<script></script>"))
    }

    #[test]
    fn test_stages_write_to_mode_output() {
        let develop = pipeline(BuildMode::Develop);
        let styles = develop.stage(StageKind::Styles).unwrap();
        let templates = develop.stage_named("templates").unwrap();

        assert_eq!(styles.dest(), std::path::Path::new("/site/dist/css"));
        assert_eq!(templates.dest(), std::path::Path::new("/site/dist"));
        assert_eq!(styles.policy(), FailurePolicy::Recover);
    }

    #[test]
    fn test_produce_aborts_on_failure() {
        let produce = pipeline(BuildMode::Produce);

        assert!(produce.stages().iter().all(|s| s.policy() == FailurePolicy::Abort));
        assert_eq!(
            produce.stage(StageKind::Images).unwrap().dest(),
            std::path::Path::new("/site/build/img")
        );
    }

    #[test]
    fn test_task_cleans_before_building() {
        let task = pipeline(BuildMode::Develop).task();

        assert_eq!(
            format!("{task:?}"),
            "Series([clean, Parallel([styles, scripts, images, templates])])"
        );
    }

    #[test]
    fn test_unknown_stage_name() {
        assert!(pipeline(BuildMode::Develop).stage_named("fonts").is_none());
    }
}
