//! Research pipeline: extract the entity, research it, summarize

use relay_core::{Result, UnitSpec};
use relay_runtime::UnitRuntime;
use relay_workflow::SequentialPipeline;

/// Three-stage research pipeline
///
/// `extrator_de_entidade → entidade`, `pesquisador → pesquisa`,
/// `sumarizador → sumario`. The researcher sees every tool registered in the
/// runtime; search is only available if a search tool was registered.
pub fn research_pipeline(runtime: &UnitRuntime) -> Result<SequentialPipeline> {
    let extractor = runtime.plain_unit(
        UnitSpec::builder("extrator_de_entidade")
            .description("Você é um assistente de extração de entidade.")
            .instruction(
                "A cada requisição do usuário extraia a entidade que o mesmo está pesquisando. \
                 Responda apenas com a entidade.",
            )
            .output_key("entidade")
            .build(),
    )?;

    let researcher = runtime.llm_unit(
        UnitSpec::builder("pesquisador")
            .description("Você é um assistente de pesquisa que busca a partir de entidades.")
            .instruction(
                "Você é um assistente de pesquisa que busca informações sobre {{ entidade }}.\
                 {% if entidade is not defined %} Nenhuma entidade foi extraída; pesquise a \
                 partir da requisição: {{ query }}.{% endif %}",
            )
            .input("entidade")
            .output_key("pesquisa")
            .build(),
    )?;

    let summarizer = runtime.plain_unit(
        UnitSpec::builder("sumarizador")
            .description("Você é um assistente de sumarização.")
            .instruction("Você é um assistente de sumarização que resume a partir de {{ pesquisa }}.")
            .input("pesquisa")
            .output_key("sumario")
            .build(),
    )?;

    SequentialPipeline::builder("pesquisador_pipeline")
        .description("Você é um assistente de pesquisa.")
        .add(extractor)
        .add(researcher)
        .add(summarizer)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_llm::providers::ScriptedBackend;
    use relay_workflow::RunStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_research_pipeline_threads_state() {
        let backend = ScriptedBackend::new()
            .reply("fundos imobiliários de logística")
            .reply("Galpões logísticos com contratos atípicos e vacância baixa.")
            .reply("Resumo: setor logístico resiliente.");
        let runtime = UnitRuntime::builder().backend(Arc::new(backend)).build().unwrap();

        let pipeline = research_pipeline(&runtime).unwrap();
        assert_eq!(
            pipeline.stage_names(),
            vec!["extrator_de_entidade", "pesquisador", "sumarizador"]
        );

        let run = pipeline.run("fundos imobiliários de logística").await;
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stages.len(), 3);
        assert_eq!(run.state.get("entidade").unwrap(), "fundos imobiliários de logística");
        let pesquisa = run.state.get("pesquisa").and_then(|v| v.as_str()).unwrap();
        let sumario = run.output_text();
        assert_eq!(sumario, "Resumo: setor logístico resiliente.");
        assert!(sumario.chars().count() <= pesquisa.chars().count());
        assert!(run.events_by("sumarizador").count() > 0);
    }

    #[tokio::test]
    async fn test_research_pipeline_offline_echo() {
        let pipeline = research_pipeline(&UnitRuntime::offline()).unwrap();
        let run = pipeline.run("fundos imobiliários de logística").await;

        assert!(run.is_completed());
        assert!(run.output_text().contains("fundos imobiliários de logística"));
    }
}
