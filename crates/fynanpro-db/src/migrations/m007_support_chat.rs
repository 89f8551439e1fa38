use fynanpro_common::Result;
use rusqlite::{Connection, params};
use tracing::info;

use crate::db_err;
use crate::probe::SchemaProbe;

/// Keyword-triggered canned answers for the support chat.
const QUICK_REPLIES: [(&str, &str); 8] = [
    (
        "plano",
        "Temos planos a partir de R$ 9,90/mês! Acesse \"Planos\" no menu para ver todas as opções.",
    ),
    (
        "pagamento",
        "Aceitamos cartão de crédito e PIX. Todos os pagamentos são seguros.",
    ),
    (
        "teste",
        "Você tem 7 dias grátis para testar todas as funcionalidades premium!",
    ),
    (
        "cancelar",
        "Para cancelar sua assinatura, acesse seu perfil e clique em \"Gerenciar Plano\".",
    ),
    (
        "suporte",
        "Conectando você com um atendente humano... Por favor, aguarde.",
    ),
    (
        "transação",
        "Acesse \"Transações\" no menu para ver o histórico, editar ou excluir lançamentos.",
    ),
    (
        "categoria",
        "Acesse \"Categorias\" no menu para criar novas categorias ou editar as existentes.",
    ),
    (
        "saldo",
        "Seu saldo é calculado automaticamente: receitas menos despesas.",
    ),
];

pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS support_agents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            last_login DATETIME
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            sender TEXT NOT NULL,
            is_read INTEGER NOT NULL DEFAULT 0,
            replied_by_agent_id INTEGER REFERENCES support_agents(id) ON DELETE SET NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS quick_replies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            keyword TEXT UNIQUE NOT NULL,
            response TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );",
    )
    .map_err(db_err("failed to create support chat tables"))?;

    // Chat tables from before agent replies existed.
    if !probe.column_exists("chat_messages", "replied_by_agent_id")? {
        conn.execute_batch("ALTER TABLE chat_messages ADD COLUMN replied_by_agent_id INTEGER;")
            .map_err(db_err("failed to add chat_messages.replied_by_agent_id"))?;
        info!("added chat_messages.replied_by_agent_id");
    }
    if probe.column_exists("chat_messages", "user_id")? {
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_user ON chat_messages(user_id);",
        )
        .map_err(db_err("failed to index chat_messages"))?;
    }

    let mut inserted = 0;
    for (keyword, response) in QUICK_REPLIES {
        inserted += conn
            .execute(
                "INSERT INTO quick_replies (keyword, response)
                 SELECT ?1, ?2
                 WHERE NOT EXISTS (SELECT 1 FROM quick_replies WHERE keyword = ?1)",
                params![keyword, response],
            )
            .map_err(db_err("failed to seed quick reply"))?;
    }
    info!("{inserted} quick replies inserted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::test_support::{apply, columns, count, memory};

    #[test]
    fn creates_chat_tables_and_seeds_replies_once() {
        let conn = memory();
        apply(&conn, up);
        apply(&conn, up);

        assert_eq!(
            count(&conn, "SELECT COUNT(*) FROM quick_replies"),
            QUICK_REPLIES.len() as i64
        );
        assert!(columns(&conn, "chat_messages").contains(&"replied_by_agent_id".to_string()));
    }

    #[test]
    fn customized_reply_is_not_overwritten() {
        let conn = memory();
        conn.execute_batch(
            "CREATE TABLE quick_replies (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 keyword TEXT UNIQUE NOT NULL,
                 response TEXT NOT NULL,
                 is_active INTEGER DEFAULT 1
             );
             INSERT INTO quick_replies (keyword, response) VALUES ('plano', 'Promoção!');
             CREATE TABLE chat_messages (
                 id INTEGER PRIMARY KEY, user_id INTEGER, message TEXT, sender TEXT
             );",
        )
        .unwrap();

        apply(&conn, up);

        let response: String = conn
            .query_row(
                "SELECT response FROM quick_replies WHERE keyword = 'plano'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(response, "Promoção!");
        assert!(columns(&conn, "chat_messages").contains(&"replied_by_agent_id".to_string()));
    }
}
