use fynanpro_common::{CategoryKind, Result};
use rusqlite::{Connection, params};
use tracing::{info, warn};

use crate::db_err;
use crate::probe::SchemaProbe;

struct SeedCategory {
    kind: CategoryKind,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
}

const fn seed(
    kind: CategoryKind,
    name: &'static str,
    description: &'static str,
    icon: &'static str,
) -> SeedCategory {
    SeedCategory {
        kind,
        name,
        description,
        icon,
    }
}

/// System categories shared by every user (`user_id IS NULL`).
const DEFAULT_CATEGORIES: [SeedCategory; 13] = [
    seed(CategoryKind::Income, "Salário", "Salário principal", "💰"),
    seed(CategoryKind::Income, "Freelance", "Trabalhos extras", "💼"),
    seed(CategoryKind::Income, "Vendas", "Vendas de produtos e serviços", "🏷️"),
    seed(CategoryKind::Income, "Investimentos", "Dividendos, juros", "📈"),
    seed(CategoryKind::Income, "Outras Receitas", "Outras fontes de renda", "💵"),
    seed(CategoryKind::Expense, "Alimentação", "Gastos com comida e restaurantes", "🍽️"),
    seed(CategoryKind::Expense, "Moradia", "Aluguel, financiamento, condomínio", "🏠"),
    seed(CategoryKind::Expense, "Transporte", "Combustível, transporte público, manutenção", "🚗"),
    seed(CategoryKind::Expense, "Saúde", "Consultas, medicamentos, plano de saúde", "🏥"),
    seed(CategoryKind::Expense, "Educação", "Cursos, livros, material escolar", "📚"),
    seed(CategoryKind::Expense, "Lazer", "Cinema, viagens, hobbies", "🎵"),
    seed(CategoryKind::Expense, "Compras", "Roupas, eletrônicos, utensílios", "🛍️"),
    seed(CategoryKind::Expense, "Contas", "Luz, água, internet, telefone", "📄"),
];

/// Insert the default categories that are not there yet.
pub fn up(conn: &Connection, probe: &dyn SchemaProbe) -> Result<()> {
    if !probe.table_exists("categories")? {
        warn!("categories table missing, skipping default categories");
        return Ok(());
    }

    let mut inserted = 0;
    for category in &DEFAULT_CATEGORIES {
        inserted += conn
            .execute(
                "INSERT INTO categories (user_id, name, category_type, description, icon)
                 SELECT NULL, ?1, ?2, ?3, ?4
                 WHERE NOT EXISTS (
                     SELECT 1 FROM categories
                     WHERE user_id IS NULL AND name = ?1 AND category_type = ?2
                 )",
                params![
                    category.name,
                    category.kind.as_str(),
                    category.description,
                    category.icon
                ],
            )
            .map_err(db_err("failed to seed category"))?;
    }

    info!(
        "{inserted} default categories inserted ({} already present)",
        DEFAULT_CATEGORIES.len() - inserted
    );
    Ok(())
}
