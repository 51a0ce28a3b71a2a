use serde::Serialize;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo records loaded by `opsdesk seed`. Re-running the seed leaves existing rows untouched.
pub struct DemoSeed;

struct TeamMemberSeed {
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    country: &'static str,
    joined_on: Option<&'static str>,
}

struct ClientSeed {
    name: &'static str,
    description: &'static str,
    email: &'static str,
}

const TEAM_MEMBERS: &[TeamMemberSeed] = &[
    TeamMemberSeed {
        first_name: "Ada",
        last_name: "Lovelace",
        email: "ada.lovelace@opsdesk.test",
        country: "United Kingdom",
        joined_on: Some("2023-02-01"),
    },
    TeamMemberSeed {
        first_name: "Alan",
        last_name: "Turing",
        email: "alan.turing@opsdesk.test",
        country: "United Kingdom",
        joined_on: Some("2023-09-18"),
    },
    TeamMemberSeed {
        first_name: "Katherine",
        last_name: "Johnson",
        email: "katherine.johnson@opsdesk.test",
        country: "United States",
        joined_on: None,
    },
];

const CLIENTS: &[ClientSeed] = &[
    ClientSeed {
        name: "Acme Corp",
        description: "Industrial supplies, annual support plan",
        email: "contact@acme.test",
    },
    ClientSeed {
        name: "Globex Industries",
        description: "Logistics platform rollout",
        email: "it@globex.test",
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub team_members_inserted: u64,
    pub clients_inserted: u64,
    pub team_members_total: i64,
    pub clients_total: i64,
}

impl DemoSeed {
    pub fn team_member_emails() -> Vec<&'static str> {
        TEAM_MEMBERS.iter().map(|seed| seed.email).collect()
    }

    pub fn client_emails() -> Vec<&'static str> {
        CLIENTS.iter().map(|seed| seed.email).collect()
    }

    pub async fn load(pool: &DbPool) -> Result<SeedReport, RepositoryError> {
        let mut tx = pool.begin().await?;
        let mut report = SeedReport::default();

        for seed in TEAM_MEMBERS {
            let result = sqlx::query(
                "INSERT INTO team_member (first_name, last_name, email, country, joined_on)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(email) DO NOTHING",
            )
            .bind(seed.first_name)
            .bind(seed.last_name)
            .bind(seed.email)
            .bind(seed.country)
            .bind(seed.joined_on)
            .execute(&mut *tx)
            .await?;
            report.team_members_inserted += result.rows_affected();
        }

        for seed in CLIENTS {
            let result = sqlx::query(
                "INSERT INTO client (name, description, email)
                 VALUES (?, ?, ?)
                 ON CONFLICT(email) DO NOTHING",
            )
            .bind(seed.name)
            .bind(seed.description)
            .bind(seed.email)
            .execute(&mut *tx)
            .await?;
            report.clients_inserted += result.rows_affected();
        }

        report.team_members_total =
            sqlx::query_scalar("SELECT COUNT(*) FROM team_member").fetch_one(&mut *tx).await?;
        report.clients_total =
            sqlx::query_scalar("SELECT COUNT(*) FROM client").fetch_one(&mut *tx).await?;

        tx.commit().await?;
        Ok(report)
    }
}
