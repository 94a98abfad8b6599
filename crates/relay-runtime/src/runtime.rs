//! Runtime for building units with shared dependencies
//!
//! The UnitRuntime holds the model backend and tool registry shared by the
//! units of an application, and provides factory methods for each unit kind.

use relay_core::{Error, Result, UnitSpec};
use relay_llm::ModelBackend;
use relay_llm::providers::{OpenAiBackend, ScriptedBackend};
use relay_tools::{Tool, ToolRegistry};
use relay_utils::Settings;
use std::sync::Arc;
use tracing::info;

use crate::executor::{ExecutorConfig, UnitExecutor};
use crate::units::{ArgumentSource, LlmUnit, ToolCallUnit};

/// Shared dependencies for unit construction
///
/// ```no_run
/// use relay_core::UnitSpec;
/// use relay_runtime::UnitRuntime;
/// use relay_utils::Settings;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = UnitRuntime::from_settings(&Settings::from_env()?)?;
/// let summarizer = runtime.llm_unit(
///     UnitSpec::builder("sumarizador")
///         .instruction("Resuma {{ pesquisa }}")
///         .input("pesquisa")
///         .output_key("sumario")
///         .build(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UnitRuntime {
    backend: Arc<dyn ModelBackend>,
    tools: Arc<ToolRegistry>,
    config: ExecutorConfig,
}

impl UnitRuntime {
    pub fn builder() -> UnitRuntimeBuilder {
        UnitRuntimeBuilder::default()
    }

    /// Runtime backed by the OpenAI-compatible endpoint in `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let backend = OpenAiBackend::from_settings(settings)?;
        info!(api_base = %settings.api_base, model = %settings.model, "using OpenAI-compatible backend");
        Self::builder().backend(Arc::new(backend)).build()
    }

    /// Runtime with a scripted backend that echoes its input
    pub fn offline() -> Self {
        Self {
            backend: Arc::new(ScriptedBackend::new()),
            tools: Arc::new(ToolRegistry::new()),
            config: ExecutorConfig::default(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Register a tool in the shared registry
    pub fn register_tool(&self, tool: Arc<dyn Tool>) {
        self.tools.register(tool);
    }

    /// Model-driven unit with access to every shared tool
    pub fn llm_unit(&self, spec: UnitSpec) -> Result<LlmUnit> {
        self.llm_unit_with_tools(spec, Arc::clone(&self.tools))
    }

    /// Model-driven unit restricted to the given tools
    pub fn llm_unit_with_tools(&self, spec: UnitSpec, tools: Arc<ToolRegistry>) -> Result<LlmUnit> {
        let executor = UnitExecutor::new(Arc::clone(&self.backend), tools, self.config.clone());
        LlmUnit::new(spec, executor)
    }

    /// Model-driven unit with no tools
    pub fn plain_unit(&self, spec: UnitSpec) -> Result<LlmUnit> {
        self.llm_unit_with_tools(spec, Arc::new(ToolRegistry::new()))
    }

    /// Deterministic unit calling one registered tool
    pub fn tool_unit(
        &self,
        spec: UnitSpec,
        tool_name: &str,
        source: ArgumentSource,
        param: &str,
    ) -> Result<ToolCallUnit> {
        let tool = self.tools.get(tool_name).ok_or_else(|| {
            Error::InitializationFailed(format!("tool '{tool_name}' is not registered"))
        })?;
        ToolCallUnit::new(spec, tool, source, param)
    }
}

/// Builder for [`UnitRuntime`]
#[derive(Default)]
pub struct UnitRuntimeBuilder {
    backend: Option<Arc<dyn ModelBackend>>,
    tools: Option<Arc<ToolRegistry>>,
    config: ExecutorConfig,
}

impl UnitRuntimeBuilder {
    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<UnitRuntime> {
        let backend = self
            .backend
            .ok_or_else(|| Error::InitializationFailed("a model backend is required".to_string()))?;
        Ok(UnitRuntime {
            backend,
            tools: self.tools.unwrap_or_default(),
            config: self.config,
        })
    }
}
