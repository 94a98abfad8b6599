//! FII advisor pipeline: find tickers, fetch market data, write a report

use relay_core::{Result, UnitSpec};
use relay_runtime::{ArgumentSource, UnitRuntime};
use relay_tools::{Tool, ToolRegistry};
use relay_workflow::SequentialPipeline;
use std::sync::Arc;

use crate::tools::FII_DATA_TOOL;

/// Three-stage FII advisor
///
/// 1. `pesquisador_financeiro` names the relevant tickers (`tickers_string`)
/// 2. `analista_financeiro` calls `get_fii_data` with them (`informacoes_fiis`)
/// 3. `redator_relatorio` writes the report (`relatorio_final`)
///
/// The data tool is registered in the runtime. The researcher only sees the
/// tools that were registered before it, so it cannot call the data tool.
pub fn fii_advisor_pipeline(runtime: &UnitRuntime, fii_data: Arc<dyn Tool>) -> Result<SequentialPipeline> {
    let search_tools = ToolRegistry::new();
    for tool in runtime.tools().list_tools() {
        search_tools.register(tool);
    }

    let researcher = runtime.llm_unit_with_tools(
        UnitSpec::builder("pesquisador_financeiro")
            .description(
                "Você é um assistente de pesquisa que identifica tickers de fundos imobiliários \
                 (FIIs) com base em uma consulta do usuário.",
            )
            .instruction(
                "Com base na consulta do usuário, encontre os tickers de FIIs relevantes.\n\
                 Sua resposta DEVE ser uma string única contendo os tickers encontrados, \
                 separados por vírgula.\n\
                 Exemplo de saída: 'HGLG11,KNRI11,XPLG11'\n\
                 Não inclua nenhuma outra informação ou formatação na sua resposta, apenas a \
                 string de tickers.",
            )
            .output_key("tickers_string")
            .build(),
        Arc::new(search_tools),
    )?;

    runtime.register_tool(fii_data);
    let analyst = runtime.tool_unit(
        UnitSpec::builder("analista_financeiro")
            .description(
                "Você é um especialista em FIIs que obtém dados de mercado atualizados para uma \
                 lista de tickers.",
            )
            .input("tickers_string")
            .output_key("informacoes_fiis")
            .build(),
        FII_DATA_TOOL,
        ArgumentSource::Input("tickers_string".to_string()),
        "tickers_string",
    )?;

    let writer = runtime.plain_unit(
        UnitSpec::builder("redator_relatorio")
            .description("Você é um assistente de escrita que cria relatórios financeiros detalhados.")
            .instruction(
                "Com base nos dados financeiros de FIIs em {{ informacoes_fiis }}, crie um \
                 relatório claro e conciso.\n\
                 O relatório deve apresentar os dados de cada FII de forma organizada, incluindo \
                 nome, preço atual, máxima e mínima do dia e dividend yield.\n\
                 Tickers com erro devem ser listados como indisponíveis.\n\
                 Finalize com um breve resumo comparativo.",
            )
            .input("informacoes_fiis")
            .output_key("relatorio_final")
            .build(),
    )?;

    SequentialPipeline::builder("fii_advisor_agent")
        .description("Um agente sequencial que pesquisa FIIs, analisa os dados e gera um relatório.")
        .add(researcher)
        .add(analyst)
        .add(writer)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FundSnapshot, MockQuoteSource};
    use crate::config::FinanceConfig;
    use crate::error::FinanceError;
    use crate::tools::FiiDataTool;
    use relay_core::EventPayload;
    use relay_llm::providers::ScriptedBackend;
    use relay_workflow::RunStatus;

    fn mocked_fii_tool() -> Arc<dyn Tool> {
        let mut mock = MockQuoteSource::new();
        mock.expect_fund_snapshot().returning(|symbol| match symbol {
            "HGLG11.SA" => Ok(FundSnapshot {
                name: Some("CGHG Logística FII".to_string()),
                close: 160.5,
                high: 161.2,
                low: 159.8,
                dividend_yield: Some(0.087),
            }),
            other => Err(FinanceError::NoData(other.to_string())),
        });
        Arc::new(FiiDataTool::new(FinanceConfig::default(), Arc::new(mock)).unwrap())
    }

    #[tokio::test]
    async fn test_advisor_with_one_invalid_ticker() {
        let backend = ScriptedBackend::new()
            .reply("HGLG11,INVALID1")
            .reply("Relatório: HGLG11 a R$ 160,50; INVALID1 indisponível.");
        let runtime = UnitRuntime::builder().backend(Arc::new(backend)).build().unwrap();

        let pipeline = fii_advisor_pipeline(&runtime, mocked_fii_tool()).unwrap();
        let run = pipeline.run("FIIs de logística com bom dividend yield").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.state.get("tickers_string").unwrap(), "HGLG11,INVALID1");

        let data = run.state.get("informacoes_fiis").unwrap();
        assert_eq!(data.as_object().unwrap().len(), 2);
        assert!(data["HGLG11"]["current_price"].as_f64().unwrap().is_finite());
        assert!(data["INVALID1"]["error"].is_string());

        assert_eq!(
            run.output_text(),
            "Relatório: HGLG11 a R$ 160,50; INVALID1 indisponível."
        );

        let calls = run
            .events_by("analista_financeiro")
            .filter(|e| matches!(&e.payload, EventPayload::FunctionCall { .. }))
            .count();
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_no_tickers_found_still_completes() {
        let backend = ScriptedBackend::new().reply("");
        let runtime = UnitRuntime::builder().backend(Arc::new(backend)).build().unwrap();

        let pipeline = fii_advisor_pipeline(&runtime, mocked_fii_tool()).unwrap();
        let run = pipeline.run("FIIs inexistentes").await;

        assert_eq!(run.status, RunStatus::Completed);
        assert!(!run.state.contains_key("tickers_string"));
        assert!(!run.state.contains_key("informacoes_fiis"));
        assert_eq!(run.output_text(), "");
    }

    #[test]
    fn test_researcher_cannot_see_data_tool() {
        let runtime = UnitRuntime::offline();
        let pipeline = fii_advisor_pipeline(&runtime, mocked_fii_tool()).unwrap();

        assert_eq!(
            pipeline.stage_names(),
            vec!["pesquisador_financeiro", "analista_financeiro", "redator_relatorio"]
        );
        assert!(runtime.tools().get(FII_DATA_TOOL).is_some());
        assert_eq!(pipeline.output_key(), Some("relatorio_final"));
    }
}
