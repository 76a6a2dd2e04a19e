pub mod cron;
pub mod server;

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinSet;

use crate::state::AppState;

#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
  fn name(&self) -> &'static str {
    std::any::type_name::<Self>()
  }

  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()>;
}

pub struct App {
  plugins: Vec<Box<dyn Plugin>>,
}

impl App {
  pub fn new() -> Self {
    Self { plugins: Vec::new() }
  }

  pub fn register<P: Plugin + 'static>(mut self, plugin: P) -> Self {
    self.plugins.push(Box::new(plugin));
    self
  }

  /// Start every plugin on its own task.
  pub fn run(self, app: Arc<AppState>) -> Running {
    let mut tasks = JoinSet::new();

    for plugin in self.plugins {
      let app = app.clone();

      tasks.spawn(async move {
        let name = plugin.name();
        tracing::info!("init `{}`", name);

        plugin
          .start(app)
          .await
          .with_context(|| format!("plugin `{name}` failed"))
      });
    }

    Running { tasks }
  }
}

pub struct Running {
  tasks: JoinSet<anyhow::Result<()>>,
}

impl Running {
  /// Resolves with the first plugin error. Plugins that return `Ok` are
  /// done; if every plugin is done or still running this never resolves.
  pub async fn failure(&mut self) -> anyhow::Error {
    while let Some(joined) = self.tasks.join_next().await {
      match joined {
        Ok(Ok(())) => {}
        Ok(Err(err)) => return err,
        Err(err) => return anyhow::Error::new(err).context("plugin panicked"),
      }
    }

    std::future::pending().await
  }
}
