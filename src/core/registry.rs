//! Fund registry ("cadastral") snapshot: identity, class and status of
//! every fund known to the regulator.

use super::error::{FundsError, Result};
use super::snapshot::Snapshot;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::{Span, debug, info_span};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FundStatus {
    Active,
    Cancelled,
    Other(String),
}

impl FundStatus {
    fn from_label(label: &str) -> Self {
        match label.trim() {
            "EM FUNCIONAMENTO NORMAL" => FundStatus::Active,
            "CANCELADA" => FundStatus::Cancelled,
            other => FundStatus::Other(other.to_string()),
        }
    }
}

impl Display for FundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundStatus::Active => write!(f, "EM FUNCIONAMENTO NORMAL"),
            FundStatus::Cancelled => write!(f, "CANCELADA"),
            FundStatus::Other(label) => write!(f, "{label}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FundClass {
    Equity,
    MultiStrategy,
    Fx,
    FixedIncome,
    Other(String),
}

impl FundClass {
    fn from_label(label: &str) -> Self {
        match label.trim() {
            "Fundo de Ações" => FundClass::Equity,
            "Fundo Multimercado" => FundClass::MultiStrategy,
            "Fundo Cambial" => FundClass::Fx,
            "Fundo de Renda Fixa" => FundClass::FixedIncome,
            other => FundClass::Other(other.to_string()),
        }
    }
}

impl Display for FundClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundClass::Equity => write!(f, "Fundo de Ações"),
            FundClass::MultiStrategy => write!(f, "Fundo Multimercado"),
            FundClass::Fx => write!(f, "Fundo Cambial"),
            FundClass::FixedIncome => write!(f, "Fundo de Renda Fixa"),
            FundClass::Other(label) => write!(f, "{label}"),
        }
    }
}

/// One row of the registry snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryRecord {
    pub id: String,
    pub name: String,
    pub registered_on: Option<NaiveDate>,
    pub constituted_on: Option<NaiveDate>,
    pub cancelled_on: Option<NaiveDate>,
    pub status: FundStatus,
    pub status_since: Option<NaiveDate>,
    pub activity_since: Option<NaiveDate>,
    pub fiscal_year_start: Option<NaiveDate>,
    pub fiscal_year_end: Option<NaiveDate>,
    pub class: FundClass,
    pub class_since: Option<NaiveDate>,
    pub performance_indicator: String,
    pub condominium: String,
    pub quota_fund: String,
    pub exclusive_fund: String,
    pub long_term_taxation: String,
    pub qualified_investor: String,
    pub performance_fee: Option<f64>,
    pub performance_fee_info: String,
    pub admin_fee: Option<f64>,
    pub admin_fee_info: String,
    pub net_worth: Option<f64>,
    pub net_worth_date: Option<NaiveDate>,
    pub director: String,
    pub administrator_id: String,
    pub administrator: String,
    pub manager_kind: String,
    pub manager_id: String,
    pub manager: String,
    pub auditor_id: String,
    pub auditor: String,
    pub custodian_id: String,
    pub custodian: String,
    pub controller_id: String,
    pub controller: String,
}

impl RegistryRecord {
    /// Every field with a human readable label, in snapshot column order.
    pub fn labelled_fields(&self) -> Vec<(&'static str, String)> {
        fn date(value: Option<NaiveDate>) -> String {
            value.map(|d| d.to_string()).unwrap_or_default()
        }
        fn number(value: Option<f64>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }

        vec![
            ("CNPJ do fundo", self.id.clone()),
            ("Denominação Social", self.name.clone()),
            ("Data de registro", date(self.registered_on)),
            ("Data de constituição", date(self.constituted_on)),
            ("Data de cancelamento", date(self.cancelled_on)),
            ("Situação", self.status.to_string()),
            ("Data início da situação", date(self.status_since)),
            ("Data de início de atividade", date(self.activity_since)),
            ("Data início do exercício social", date(self.fiscal_year_start)),
            ("Data fim do exercício social", date(self.fiscal_year_end)),
            ("Classe", self.class.to_string()),
            ("Data de início na classe", date(self.class_since)),
            ("Forma de rentabilidade do fundo", self.performance_indicator.clone()),
            ("Forma de condomínio", self.condominium.clone()),
            ("Fundo de cotas", self.quota_fund.clone()),
            ("Fundo exclusivo", self.exclusive_fund.clone()),
            ("Tributação de longo prazo", self.long_term_taxation.clone()),
            ("Investidores qualificados", self.qualified_investor.clone()),
            ("Taxa de performance", number(self.performance_fee)),
            ("Informações adicionais (taxa de performance)", self.performance_fee_info.clone()),
            ("Taxa de administração", number(self.admin_fee)),
            ("Informações adicionais (taxa de administração)", self.admin_fee_info.clone()),
            ("Valor do patrimônio líquido", number(self.net_worth)),
            ("Data do patrimônio líquido", date(self.net_worth_date)),
            ("Diretor responsável", self.director.clone()),
            ("CNPJ do administrador", self.administrator_id.clone()),
            ("Administrador", self.administrator.clone()),
            ("Gestor pessoa física ou jurídica", self.manager_kind.clone()),
            ("CPF/CNPJ do gestor", self.manager_id.clone()),
            ("Gestor", self.manager.clone()),
            ("CNPJ do auditor", self.auditor_id.clone()),
            ("Auditor", self.auditor.clone()),
            ("CNPJ do custodiante", self.custodian_id.clone()),
            ("Custodiante", self.custodian.clone()),
            ("CNPJ do controlador", self.controller_id.clone()),
            ("Controlador", self.controller.clone()),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryRow {
    #[serde(rename = "CNPJ_FUNDO", alias = "CNPJ_FUNDO_CLASSE")]
    id: String,
    #[serde(rename = "DENOM_SOCIAL")]
    name: String,
    #[serde(rename = "DT_REG", deserialize_with = "csv::invalid_option")]
    registered_on: Option<NaiveDate>,
    #[serde(rename = "DT_CONST", deserialize_with = "csv::invalid_option")]
    constituted_on: Option<NaiveDate>,
    #[serde(rename = "DT_CANCEL", deserialize_with = "csv::invalid_option")]
    cancelled_on: Option<NaiveDate>,
    #[serde(rename = "SIT")]
    status: String,
    #[serde(rename = "DT_INI_SIT", deserialize_with = "csv::invalid_option")]
    status_since: Option<NaiveDate>,
    #[serde(rename = "DT_INI_ATIV", deserialize_with = "csv::invalid_option")]
    activity_since: Option<NaiveDate>,
    #[serde(rename = "DT_INI_EXERC", deserialize_with = "csv::invalid_option")]
    fiscal_year_start: Option<NaiveDate>,
    #[serde(rename = "DT_FIM_EXERC", deserialize_with = "csv::invalid_option")]
    fiscal_year_end: Option<NaiveDate>,
    #[serde(rename = "CLASSE")]
    class: String,
    #[serde(rename = "DT_INI_CLASSE", deserialize_with = "csv::invalid_option")]
    class_since: Option<NaiveDate>,
    #[serde(rename = "RENTAB_FUNDO")]
    performance_indicator: String,
    #[serde(rename = "CONDOM")]
    condominium: String,
    #[serde(rename = "FUNDO_COTAS")]
    quota_fund: String,
    #[serde(rename = "FUNDO_EXCLUSIVO")]
    exclusive_fund: String,
    #[serde(rename = "TRIB_LPRAZO")]
    long_term_taxation: String,
    #[serde(rename = "INVEST_QUALIF")]
    qualified_investor: String,
    #[serde(rename = "TAXA_PERFM", deserialize_with = "csv::invalid_option")]
    performance_fee: Option<f64>,
    #[serde(rename = "INF_TAXA_PERFM")]
    performance_fee_info: String,
    #[serde(rename = "TAXA_ADM", deserialize_with = "csv::invalid_option")]
    admin_fee: Option<f64>,
    #[serde(rename = "INF_TAXA_ADM")]
    admin_fee_info: String,
    #[serde(rename = "VL_PATRIM_LIQ", deserialize_with = "csv::invalid_option")]
    net_worth: Option<f64>,
    #[serde(rename = "DT_PATRIM_LIQ", deserialize_with = "csv::invalid_option")]
    net_worth_date: Option<NaiveDate>,
    #[serde(rename = "DIRETOR")]
    director: String,
    #[serde(rename = "CNPJ_ADMIN")]
    administrator_id: String,
    #[serde(rename = "ADMIN")]
    administrator: String,
    #[serde(rename = "PF_PJ_GESTOR")]
    manager_kind: String,
    #[serde(rename = "CPF_CNPJ_GESTOR")]
    manager_id: String,
    #[serde(rename = "GESTOR")]
    manager: String,
    #[serde(rename = "CNPJ_AUDITOR")]
    auditor_id: String,
    #[serde(rename = "AUDITOR")]
    auditor: String,
    #[serde(rename = "CNPJ_CUSTODIANTE")]
    custodian_id: String,
    #[serde(rename = "CUSTODIANTE")]
    custodian: String,
    #[serde(rename = "CNPJ_CONTROLADOR")]
    controller_id: String,
    #[serde(rename = "CONTROLADOR")]
    controller: String,
}

impl From<RegistryRow> for RegistryRecord {
    fn from(row: RegistryRow) -> Self {
        RegistryRecord {
            id: row.id.trim().to_string(),
            status: FundStatus::from_label(&row.status),
            class: FundClass::from_label(&row.class),
            name: row.name,
            registered_on: row.registered_on,
            constituted_on: row.constituted_on,
            cancelled_on: row.cancelled_on,
            status_since: row.status_since,
            activity_since: row.activity_since,
            fiscal_year_start: row.fiscal_year_start,
            fiscal_year_end: row.fiscal_year_end,
            class_since: row.class_since,
            performance_indicator: row.performance_indicator,
            condominium: row.condominium,
            quota_fund: row.quota_fund,
            exclusive_fund: row.exclusive_fund,
            long_term_taxation: row.long_term_taxation,
            qualified_investor: row.qualified_investor,
            performance_fee: row.performance_fee,
            performance_fee_info: row.performance_fee_info,
            admin_fee: row.admin_fee,
            admin_fee_info: row.admin_fee_info,
            net_worth: row.net_worth,
            net_worth_date: row.net_worth_date,
            director: row.director,
            administrator_id: row.administrator_id,
            administrator: row.administrator,
            manager_kind: row.manager_kind,
            manager_id: row.manager_id,
            manager: row.manager,
            auditor_id: row.auditor_id,
            auditor: row.auditor,
            custodian_id: row.custodian_id,
            custodian: row.custodian,
            controller_id: row.controller_id,
            controller: row.controller,
        }
    }
}

enum RegistryState {
    Unloaded,
    Loaded {
        records: Vec<RegistryRecord>,
        first_by_id: HashMap<String, usize>,
    },
}

/// Lookup table over one registry snapshot.
///
/// A registry starts `Unloaded` and becomes `Loaded` through exactly one
/// call to [`FundRegistry::load`]; queries on an unloaded registry fail with
/// [`FundsError::RegistryNotLoaded`].
pub struct FundRegistry {
    state: RegistryState,
    span: Span,
}

impl Default for FundRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FundRegistry {
    pub fn new() -> Self {
        Self {
            state: RegistryState::Unloaded,
            span: info_span!("registry"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, RegistryState::Loaded { .. })
    }

    pub fn load(&mut self, snapshot: &Snapshot) -> Result<()> {
        let _enter = self.span.enter();
        if self.is_loaded() {
            return Err(FundsError::RegistryAlreadyLoaded);
        }

        let text = snapshot.text();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        let mut first_by_id = HashMap::new();
        for (i, row) in reader.deserialize::<RegistryRow>().enumerate() {
            let row = row.map_err(|e| FundsError::Parse {
                file: snapshot.key.file_name(),
                reason: format!("row {}: {e}", i + 1),
            })?;
            let record = RegistryRecord::from(row);
            // Some snapshots list the same id more than once; the first wins.
            first_by_id.entry(record.id.clone()).or_insert(records.len());
            records.push(record);
        }

        debug!(
            file = %snapshot.key,
            records = records.len(),
            funds = first_by_id.len(),
            "Registry loaded"
        );
        self.state = RegistryState::Loaded {
            records,
            first_by_id,
        };
        Ok(())
    }

    fn loaded(&self) -> Result<(&[RegistryRecord], &HashMap<String, usize>)> {
        match &self.state {
            RegistryState::Loaded {
                records,
                first_by_id,
            } => Ok((records, first_by_id)),
            RegistryState::Unloaded => Err(FundsError::RegistryNotLoaded),
        }
    }

    /// Number of rows in the snapshot, duplicates included.
    pub fn len(&self) -> usize {
        self.loaded().map_or(0, |(records, _)| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, id: &str) -> Result<&RegistryRecord> {
        let (records, first_by_id) = self.loaded()?;
        first_by_id
            .get(id.trim())
            .map(|&index| &records[index])
            .ok_or_else(|| FundsError::FundNotFound(id.to_string()))
    }

    /// Records in snapshot order whose name contains `name` (ignoring case)
    /// and whose class equals `class`. Cancelled funds are left out unless
    /// `include_cancelled` is set.
    pub fn search(
        &self,
        name: Option<&str>,
        class: Option<&FundClass>,
        include_cancelled: bool,
    ) -> Result<Vec<&RegistryRecord>> {
        let (records, _) = self.loaded()?;
        let needle = name.map(str::to_lowercase);

        let found: Vec<&RegistryRecord> = records
            .iter()
            .filter(|r| {
                needle
                    .as_deref()
                    .is_none_or(|n| r.name.to_lowercase().contains(n))
            })
            .filter(|r| class.is_none_or(|c| &r.class == c))
            .filter(|r| include_cancelled || r.status != FundStatus::Cancelled)
            .collect();

        self.span
            .in_scope(|| debug!(?name, ?class, include_cancelled, found = found.len(), "Registry search"));
        Ok(found)
    }

    pub fn name_of(&self, id: &str) -> Result<&str> {
        self.lookup(id).map(|r| r.name.as_str())
    }

    pub fn manager_of(&self, id: &str) -> Result<&str> {
        self.lookup(id).map(|r| r.manager.as_str())
    }
}
