use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use neo4rs::{query, Graph, Node, Query, Row};
use tracing::{info, warn};
use url::Url;

use crate::config::Neo4jConfig;
use crate::models::{
    AdminRef, BirthdayCandidate, NewNotification, NewUser, Notification, RawNodeRecord,
    UserRecord, UserStorage,
};
use crate::store::{materialize, materialize_user, Store};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub async fn connect_from_config(cfg: &Neo4jConfig) -> Result<Graph> {
    let url = Url::parse(&cfg.uri)?;
    let host = url.host_str().unwrap_or("localhost");
    let port = url.port().unwrap_or(7687);
    let addr = format!("{host}:{port}");

    info!("Conectando a Neo4j en {addr}...");
    let graph = Graph::new(&addr, &cfg.user, &cfg.password).await?;
    info!("Conexión a Neo4j OK");
    Ok(graph)
}

/// Crea constraints básicos para las etiquetas usadas en el grafo:
/// :User, :StoredNode y :Notification
pub async fn ensure_schema(graph: &Graph) -> Result<()> {
    let statements = [
        // User.id y User.email únicos
        "CREATE CONSTRAINT user_id IF NOT EXISTS
         FOR (u:User)
         REQUIRE u.id IS UNIQUE",
        "CREATE CONSTRAINT user_email IF NOT EXISTS
         FOR (u:User)
         REQUIRE u.email IS UNIQUE",
        // StoredNode.id único (ficheros y carpetas comparten etiqueta)
        "CREATE CONSTRAINT stored_node_id IF NOT EXISTS
         FOR (n:StoredNode)
         REQUIRE n.id IS UNIQUE",
        // Notification.id único
        "CREATE CONSTRAINT notification_id IF NOT EXISTS
         FOR (n:Notification)
         REQUIRE n.id IS UNIQUE",
    ];

    for stmt in statements {
        graph.run(query(stmt)).await?;
    }

    info!("Esquema de Neo4j asegurado (constraints básicos creados).");
    Ok(())
}

/// Almacén sobre Neo4j: (:User)-[:OWNS]->(:StoredNode) y
/// (:Notification)-[:FOR]->(:User).
pub struct Neo4jStore {
    graph: Graph,
}

impl Neo4jStore {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    async fn fetch_all(&self, q: Query) -> Result<Vec<Row>> {
        let mut cursor = self.graph.execute(q).await?;
        let mut rows = Vec::new();
        while let Some(row) = cursor.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn notification_query(n: &Notification) -> Query {
    query(
        "CREATE (n:Notification {id: $id, title: $title, message: $message,
                                 user_id: $user_id, created_at: $created_at})
         WITH n
         OPTIONAL MATCH (u:User {id: $user_id})
         FOREACH (_ IN CASE WHEN u IS NULL THEN [] ELSE [1] END | MERGE (n)-[:FOR]->(u))",
    )
    .param("id", n.id.clone())
    .param("title", n.title.clone())
    .param("message", n.message.clone())
    .param("user_id", n.user_id.clone())
    .param("created_at", n.created_at.to_rfc3339())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

fn user_from_node(node: &Node) -> Result<UserRecord> {
    let id: String = node.get("id").ok_or_else(|| anyhow!("Usuario sin id en Neo4j"))?;
    let email: String = node
        .get("email")
        .ok_or_else(|| anyhow!("Usuario {id} sin email en Neo4j"))?;
    let created_at = node
        .get::<String>("created_at")
        .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    Ok(UserRecord {
        email,
        name: node.get("name"),
        password_hash: node.get("password"),
        is_admin: node.get("is_admin").unwrap_or(false),
        is_active: node.get("is_active").unwrap_or(true),
        sin_number: node.get("sin_number"),
        business_number: node.get("business_number"),
        date_of_birth: node.get::<String>("date_of_birth").as_deref().and_then(parse_date),
        contact_number: node.get("contact_number"),
        send_birthday_email: node.get("send_birthday_email").unwrap_or(false),
        storage_used: node.get("storage_used").unwrap_or(0),
        max_storage_limit: node.get("max_storage_limit").unwrap_or(0),
        created_at,
        id,
    })
}

#[async_trait]
impl Store for Neo4jStore {
    fn backend(&self) -> &'static str {
        "neo4j"
    }

    async fn ping(&self) -> Result<()> {
        self.graph.run(query("RETURN 1")).await?;
        Ok(())
    }

    async fn list_admins(&self) -> Result<Vec<AdminRef>> {
        let rows = self
            .fetch_all(query("MATCH (u:User) WHERE u.is_admin = true RETURN u.id AS id"))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.get::<String>("id"))
            .map(|id| AdminRef { id })
            .collect())
    }

    async fn list_storage_candidates(&self) -> Result<Vec<UserStorage>> {
        let rows = self
            .fetch_all(query(
                "MATCH (u:User) WHERE coalesce(u.max_storage_limit, 0) > 0
                 RETURN u.id AS id, u.email AS email, u.name AS name,
                        coalesce(u.storage_used, 0) AS storage_used,
                        u.max_storage_limit AS max_storage_limit",
            ))
            .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(id) = row.get::<String>("id") else {
                warn!("Usuario sin id ignorado en el cálculo de almacenamiento");
                continue;
            };
            users.push(UserStorage {
                email: row.get("email"),
                name: row.get("name"),
                storage_used: row.get("storage_used").unwrap_or(0),
                max_storage_limit: row.get("max_storage_limit").unwrap_or(0),
                id,
            });
        }
        Ok(users)
    }

    async fn list_birthday_candidates(&self) -> Result<Vec<BirthdayCandidate>> {
        let rows = self
            .fetch_all(query(
                "MATCH (u:User)
                 WHERE u.date_of_birth IS NOT NULL AND u.send_birthday_email = true
                 RETURN u.id AS id, u.name AS name, u.email AS email, u.date_of_birth AS date_of_birth",
            ))
            .await?;

        let mut users = Vec::new();
        for row in rows {
            let (Some(id), Some(raw_dob)) = (row.get::<String>("id"), row.get::<String>("date_of_birth"))
            else {
                continue;
            };
            match parse_date(&raw_dob) {
                Some(date_of_birth) => users.push(BirthdayCandidate {
                    name: row.get("name"),
                    email: row.get("email"),
                    id,
                    date_of_birth,
                }),
                None => warn!(user_id = %id, "Fecha de nacimiento ilegible: {raw_dob}"),
            }
        }
        Ok(users)
    }

    async fn create_notification(&self, notification: NewNotification) -> Result<Notification> {
        let stored = materialize(notification);
        self.graph.run(notification_query(&stored)).await?;
        Ok(stored)
    }

    async fn create_notifications(&self, batch: Vec<NewNotification>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        let tx = self.graph.start_txn().await?;
        for notification in batch.into_iter().map(materialize) {
            tx.run(notification_query(&notification)).await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn list_response_files(&self, user_id: &str) -> Result<Vec<RawNodeRecord>> {
        let rows = self
            .fetch_all(
                query(
                    "MATCH (:User {id: $user_id})-[:OWNS]->(n:StoredNode)
                     RETURN n.id AS id, n.name AS name, n.folder_name AS folder_name,
                            n.kind AS kind, n.parent_folder_id AS parent_folder_id,
                            n.url AS url, n.size AS size, n.created_at AS created_at",
                )
                .param("user_id", user_id.to_string()),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RawNodeRecord {
                id: row.get("id"),
                name: row.get("name"),
                folder_name: row.get("folder_name"),
                kind: row.get("kind"),
                parent_folder_id: row.get("parent_folder_id"),
                url: row.get("url"),
                size: row.get("size"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let rows = self
            .fetch_all(
                query("MATCH (u:User) WHERE toLower(u.email) = toLower($email) RETURN u LIMIT 1")
                    .param("email", email.to_string()),
            )
            .await?;

        match rows.first().and_then(|row| row.get::<Node>("u")) {
            Some(node) => Ok(Some(user_from_node(&node)?)),
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let record = materialize_user(user);

        let optional: Vec<(&str, Option<String>)> = vec![
            ("name", record.name.clone()),
            ("sin_number", record.sin_number.clone()),
            ("business_number", record.business_number.clone()),
            ("date_of_birth", record.date_of_birth.map(|d| d.format(DATE_FORMAT).to_string())),
            ("contact_number", record.contact_number.clone()),
        ];

        let mut cypher = String::from(
            "CREATE (u:User {id: $id, email: $email, password: $password, is_admin: $is_admin,
                             is_active: $is_active, send_birthday_email: $send_birthday_email,
                             storage_used: $storage_used, max_storage_limit: $max_storage_limit,
                             created_at: $created_at})",
        );
        for (key, value) in &optional {
            if value.is_some() {
                cypher.push_str(&format!("\nSET u.{key} = ${key}"));
            }
        }

        let mut q = query(&cypher)
            .param("id", record.id.clone())
            .param("email", record.email.clone())
            .param("password", record.password_hash.clone().unwrap_or_default())
            .param("is_admin", record.is_admin)
            .param("is_active", record.is_active)
            .param("send_birthday_email", record.send_birthday_email)
            .param("storage_used", record.storage_used)
            .param("max_storage_limit", record.max_storage_limit)
            .param("created_at", record.created_at.to_rfc3339());
        for (key, value) in optional {
            if let Some(value) = value {
                q = q.param(key, value);
            }
        }

        self.graph.run(q).await?;
        info!(user_id = %record.id, "Usuario creado en Neo4j");
        Ok(record)
    }
}
