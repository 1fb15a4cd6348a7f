// src/common/tx.rs

use sqlx::{Postgres, Transaction};

/// Modo de execução de um bloco transacional no orquestrador:
/// - Probe: executa dentro de um SAVEPOINT e sempre desfaz;
/// - Commit: executa e confirma.
///
/// Os serviços de domínio não conhecem este enum; eles recebem a conexão
/// e nunca confirmam nada sozinhos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    Probe,
    Commit,
}

impl TxMode {
    pub fn from_probe(probe: bool) -> Self {
        if probe {
            TxMode::Probe
        } else {
            TxMode::Commit
        }
    }

    pub fn is_probe(self) -> bool {
        matches!(self, TxMode::Probe)
    }
}

/// Encerra um bloco aninhado (SAVEPOINT) conforme o modo.
pub async fn finish(tx: Transaction<'_, Postgres>, mode: TxMode) -> sqlx::Result<()> {
    match mode {
        TxMode::Probe => tx.rollback().await,
        TxMode::Commit => tx.commit().await,
    }
}
