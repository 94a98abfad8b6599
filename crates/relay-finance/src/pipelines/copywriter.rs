//! Copywriting workers and their delegating host
//!
//! Two remote workers, research on port 11000 and content on port 12000,
//! plus a host on port 10000 that discovers both and delegates research
//! first, then copywriting over the research results.

use relay_core::{Result, UnitSpec};
use relay_remote::{
    AgentCard, AgentSkill, DelegatingCoordinator, RemoteClient, RemoteWorkerService,
    ServiceConfig, StaticPlan,
};
use relay_runtime::UnitRuntime;
use std::sync::Arc;

pub const HOST_PORT: u16 = 10000;
pub const RESEARCH_PORT: u16 = 11000;
pub const CONTENT_PORT: u16 = 12000;

const RESEARCH_INSTRUCTION: &str = "\
Você é um pesquisador especializado em copywriting. Sua função é:

1. Receber tópicos ou produtos para pesquisar
2. Usar as ferramentas disponíveis para encontrar informações relevantes
3. Analisar concorrentes, tendências e pontos de dor do público
4. Retornar insights estruturados em JSON:

{
    \"topic\": \"tópico pesquisado\",
    \"key_insights\": [\"insight 1\", \"insight 2\"],
    \"competitor_analysis\": [\"análise 1\", \"análise 2\"],
    \"target_audience_pain_points\": [\"dor 1\", \"dor 2\"],
    \"trending_keywords\": [\"palavra 1\", \"palavra 2\"],
    \"sources\": [\"url1\", \"url2\"]
}";

const CONTENT_INSTRUCTION: &str = "\
Você é um copywriter expert em conversão. Sua função é:

1. Receber insights de pesquisa
2. Criar copy persuasivo baseado nos dados
3. Aplicar técnicas comprovadas de copywriting (AIDA, PAS, etc.)
4. Adaptar tom e linguagem para o público-alvo
5. Incluir CTAs eficazes

Estruture sua resposta em JSON:
{
    \"headline\": \"título principal\",
    \"subheadline\": \"subtítulo\",
    \"body_copy\": \"texto principal\",
    \"bullet_points\": [\"benefício 1\", \"benefício 2\"],
    \"cta\": \"call to action\",
    \"social_proof\": \"prova social sugerida\",
    \"urgency_element\": \"elemento de urgência\"
}

Use as dores do público e insights dos concorrentes para criar copy único e persuasivo.";

fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

/// Research worker advertising `WEB_RESEARCH` at `{base_url}/research_agent`
pub fn research_service(
    runtime: &UnitRuntime,
    base_url: &str,
    config: ServiceConfig,
) -> Result<RemoteWorkerService> {
    let unit = runtime.llm_unit(
        UnitSpec::builder("research_agent")
            .description("Especialista em pesquisa web para copywriting")
            .instruction(RESEARCH_INSTRUCTION)
            .output_key("insights")
            .build(),
    )?;

    let card = AgentCard::new(
        "research_agent",
        "Agente especializado em pesquisa web para copywriting",
        endpoint_url(base_url, "research_agent"),
    )
    .skill(AgentSkill::new(
        "WEB_RESEARCH",
        "web_research",
        "Pesquisa informações na web para copywriting",
    ));

    RemoteWorkerService::new(card, Arc::new(unit), config)
}

/// Content worker advertising `COPYWRITING` at `{base_url}/content_agent`
pub fn content_service(
    runtime: &UnitRuntime,
    base_url: &str,
    config: ServiceConfig,
) -> Result<RemoteWorkerService> {
    let unit = runtime.plain_unit(
        UnitSpec::builder("content_agent")
            .description("Copywriter especialista em conversão")
            .instruction(CONTENT_INSTRUCTION)
            .output_key("copy")
            .build(),
    )?;

    let card = AgentCard::new(
        "content_agent",
        "Agente especializado em criação de copy persuasivo",
        endpoint_url(base_url, "content_agent"),
    )
    .skill(AgentSkill::new(
        "COPYWRITING",
        "copywriting",
        "Cria copy persuasivo baseado em pesquisa",
    ));

    RemoteWorkerService::new(card, Arc::new(unit), config)
}

/// Coordinator delegating to the research and content workers
///
/// Both endpoints are discovered at build time; one that cannot be reached
/// stays unresolved and its subtask is reported as a partial failure.
pub async fn host_coordinator(
    client: RemoteClient,
    research_endpoint: &str,
    content_endpoint: &str,
) -> Result<DelegatingCoordinator> {
    let coordinator = DelegatingCoordinator::builder("copywriter_host")
        .description("Coordena pesquisa e criação de copy")
        .output_key("copy_final")
        .discover(research_endpoint)
        .discover(content_endpoint)
        .planner(StaticPlan::copywriting())
        .client(client)
        .build()
        .await?;
    Ok(coordinator)
}

/// The host coordinator exposed as a worker at `{base_url}/copywriter_host`
pub fn host_service(
    coordinator: DelegatingCoordinator,
    base_url: &str,
    config: ServiceConfig,
) -> Result<RemoteWorkerService> {
    let card = AgentCard::new(
        "copywriter_host",
        "Orquestra o processo completo de copywriting",
        endpoint_url(base_url, "copywriter_host"),
    )
    .skill(AgentSkill::new(
        "COPYWRITING_ORCHESTRATION",
        "orchestrate_copywriting",
        "Orquestra processo completo de copywriting",
    ));

    RemoteWorkerService::new(card, Arc::new(coordinator), config)
}
