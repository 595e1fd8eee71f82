//! SQLite backend for the felttrip collaboration store.
//!
//! Single-file (or in-memory) sqlx store. Aggregate invariants that
//! span tables (atomic invitation acceptance, whole item-list
//! replacement) run inside one sqlite transaction.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use uuid::Uuid;

use felttrip_storage::{
    Collaborator, CreateInvitationParams, CreateItineraryParams, Invitation, InvitationId,
    InvitationStatus, Itinerary, ItineraryId, ItineraryPatch, Item, ItemKind, Principal,
    PrincipalId, Role, Store, StoreError,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Load the full aggregate for one itinerary.
    async fn load_itinerary(&self, id: &ItineraryId) -> Result<Itinerary, StoreError> {
        let head = sqlx::query_as::<_, (String, String, i64, i64)>(
            "SELECT name, owner_id, created_at, updated_at FROM itineraries WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let (name, owner_id, created_at, updated_at) = head.ok_or(StoreError::NotFound)?;

        let collab_rows = sqlx::query_as::<_, (String, String, i64)>(
            "SELECT principal_id, role, added_at FROM collaborators WHERE itinerary_id=?",
        )
        .bind(id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut collaborators = Vec::with_capacity(collab_rows.len());
        for (principal_id, role, added_at) in collab_rows {
            collaborators.push(Collaborator {
                principal_id: parse_principal_id(&principal_id)?,
                role: parse_role(&role)?,
                added_at: parse_ts(added_at)?,
            });
        }

        let item_rows = sqlx::query_as::<
            _,
            (
                String,
                String,
                String,
                Option<String>,
                Option<String>,
                Option<i64>,
                Option<String>,
            ),
        >(
            "SELECT item_id, name, kind, location, date, buy_in_cents, priority
               FROM items WHERE itinerary_id=?",
        )
        .bind(id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut items = Vec::with_capacity(item_rows.len());
        for (item_id, item_name, kind, location, date, buy_in_cents, priority) in item_rows {
            items.push(Item {
                id: item_id,
                name: item_name,
                kind: kind_from_str(&kind),
                location,
                date: date.as_deref().map(parse_date).transpose()?,
                buy_in_cents,
                priority,
            });
        }

        Ok(Itinerary {
            id: *id,
            name,
            owner: parse_principal_id(&owner_id)?,
            collaborators,
            items,
            created_at: parse_ts(created_at)?,
            updated_at: parse_ts(updated_at)?,
        })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Principals ─────────────────────────────

    async fn upsert_principal(&self, principal: &Principal) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO principals(id,name,email,created_at) VALUES(?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, email=excluded.email",
        )
        .bind(principal.id.0.to_string())
        .bind(&principal.name)
        .bind(&principal.email)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn get_principal(&self, id: &PrincipalId) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, (String, String)>(
            "SELECT name, email FROM principals WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some((name, email)) => Ok(Principal {
                id: *id,
                name,
                email,
            }),
        }
    }

    // ───────────────────────────── Itineraries ────────────────────────────

    async fn create_itinerary(
        &self,
        params: &CreateItineraryParams,
    ) -> Result<Itinerary, StoreError> {
        let id = ItineraryId(Uuid::now_v7());
        let now = Utc::now().timestamp();

        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO itineraries(id,name,owner_id,created_at,updated_at) VALUES(?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(&params.name)
        .bind(params.owner.0.to_string())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for item in &params.items {
            insert_item(&mut tx, &id, item).await?;
        }

        tx.commit().await.map_err(backend)?;
        self.load_itinerary(&id).await
    }

    async fn get_itinerary(&self, id: &ItineraryId) -> Result<Itinerary, StoreError> {
        self.load_itinerary(id).await
    }

    async fn list_itineraries_for(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<Itinerary>, StoreError> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM itineraries WHERE owner_id=?
             UNION
             SELECT itinerary_id FROM collaborators WHERE principal_id=?",
        )
        .bind(principal.0.to_string())
        .bind(principal.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (id_str,) in rows {
            let id = Uuid::try_parse(&id_str).map_err(|e| StoreError::Backend(e.to_string()))?;
            out.push(self.load_itinerary(&ItineraryId(id)).await?);
        }
        Ok(out)
    }

    async fn update_itinerary(
        &self,
        id: &ItineraryId,
        patch: &ItineraryPatch,
    ) -> Result<Itinerary, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        if let Some(name) = &patch.name {
            let res = sqlx::query("UPDATE itineraries SET name=? WHERE id=?")
                .bind(name)
                .bind(id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            if res.rows_affected() == 0 {
                return Err(StoreError::NotFound);
            }
        }

        if let Some(items) = &patch.items {
            sqlx::query("DELETE FROM items WHERE itinerary_id=?")
                .bind(id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            for item in items {
                insert_item(&mut tx, id, item).await?;
            }
        }

        sqlx::query("UPDATE itineraries SET updated_at=? WHERE id=?")
            .bind(Utc::now().timestamp())
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        self.load_itinerary(id).await
    }

    async fn delete_itinerary(&self, id: &ItineraryId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let res = sqlx::query("DELETE FROM itineraries WHERE id=?")
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        for table in ["collaborators", "items", "invitations"] {
            sqlx::query(&format!("DELETE FROM {} WHERE itinerary_id=?", table))
                .bind(id.0.to_string())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)
    }

    // ───────────────────────────── Items ──────────────────────────────────

    async fn add_item(&self, id: &ItineraryId, item: &Item) -> Result<Itinerary, StoreError> {
        // INSERT OR IGNORE keeps re-adds (replayed events) a no-op.
        let res = sqlx::query(
            "INSERT OR IGNORE INTO items(itinerary_id,item_id,name,kind,location,date,buy_in_cents,priority)
             VALUES(?,?,?,?,?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(&item.id)
        .bind(&item.name)
        .bind(item.kind.label())
        .bind(&item.location)
        .bind(item.date.map(|d| d.to_string()))
        .bind(item.buy_in_cents)
        .bind(&item.priority)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if res.rows_affected() > 0 {
            touch(&self.pool, id).await?;
        }
        self.load_itinerary(id).await
    }

    async fn remove_item(&self, id: &ItineraryId, item_id: &str) -> Result<Itinerary, StoreError> {
        let res = sqlx::query("DELETE FROM items WHERE itinerary_id=? AND item_id=?")
            .bind(id.0.to_string())
            .bind(item_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if res.rows_affected() > 0 {
            touch(&self.pool, id).await?;
        }
        self.load_itinerary(id).await
    }

    // ───────────────────────────── Collaborators ──────────────────────────

    async fn add_collaborator(
        &self,
        id: &ItineraryId,
        principal: &PrincipalId,
        role: Role,
    ) -> Result<(), StoreError> {
        let owner = sqlx::query_as::<_, (String,)>("SELECT owner_id FROM itineraries WHERE id=?")
            .bind(id.0.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or(StoreError::NotFound)?;

        // Owner is never also listed as a collaborator.
        if owner.0 == principal.0.to_string() {
            return Err(StoreError::Conflict);
        }

        sqlx::query(
            "INSERT INTO collaborators(itinerary_id,principal_id,role,added_at) VALUES(?,?,?,?)",
        )
        .bind(id.0.to_string())
        .bind(principal.0.to_string())
        .bind(role.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::Conflict
            } else {
                StoreError::Backend(s)
            }
        })?;
        Ok(())
    }

    async fn remove_collaborator(
        &self,
        id: &ItineraryId,
        principal: &PrincipalId,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM collaborators WHERE itinerary_id=? AND principal_id=?")
            .bind(id.0.to_string())
            .bind(principal.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    // ───────────────────────────── Invitations ────────────────────────────

    async fn create_invitation(
        &self,
        params: &CreateInvitationParams,
    ) -> Result<Invitation, StoreError> {
        let id = InvitationId(Uuid::now_v7());
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO invitations(id,itinerary_id,email,role,token,created_at,expires_at,status,invited_by)
             VALUES(?,?,?,?,?,?,?,'pending',?)",
        )
        .bind(id.0.to_string())
        .bind(params.itinerary_id.0.to_string())
        .bind(&params.email)
        .bind(params.role.as_str())
        .bind(&params.token)
        .bind(now.timestamp())
        .bind(params.expires_at.timestamp())
        .bind(params.invited_by.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        Ok(Invitation {
            id,
            itinerary_id: params.itinerary_id,
            email: params.email.clone(),
            role: params.role,
            token: params.token.clone(),
            created_at: now,
            expires_at: params.expires_at,
            status: InvitationStatus::Pending,
            invited_by: params.invited_by,
        })
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, String, i64, i64, String, String)>(
            "SELECT id, itinerary_id, email, role, created_at, expires_at, status, invited_by
               FROM invitations WHERE token=?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => invitation_from_row(token, row),
        }
    }

    async fn find_pending_invitation(
        &self,
        id: &ItineraryId,
        email: &str,
    ) -> Result<Option<Invitation>, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, String, i64, i64, String, String, String)>(
            "SELECT id, itinerary_id, email, role, created_at, expires_at, status, invited_by, token
               FROM invitations
              WHERE itinerary_id=? AND email=? AND status='pending'
              ORDER BY created_at DESC LIMIT 1",
        )
        .bind(id.0.to_string())
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Ok(None),
            Some((a, b, c, d, e, f, g, h, token)) => {
                Ok(Some(invitation_from_row(&token, (a, b, c, d, e, f, g, h))?))
            }
        }
    }

    async fn list_invitations(&self, id: &ItineraryId) -> Result<Vec<Invitation>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, i64, i64, String, String, String)>(
            "SELECT id, itinerary_id, email, role, created_at, expires_at, status, invited_by, token
               FROM invitations WHERE itinerary_id=? ORDER BY created_at DESC",
        )
        .bind(id.0.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for (a, b, c, d, e, f, g, h, token) in rows {
            out.push(invitation_from_row(&token, (a, b, c, d, e, f, g, h))?);
        }
        Ok(out)
    }

    async fn mark_invitation_expired(&self, id: &InvitationId) -> Result<(), StoreError> {
        // Only a pending invitation can expire; terminal states stay put.
        sqlx::query("UPDATE invitations SET status='expired' WHERE id=? AND status='pending'")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn mark_invitation_accepted(&self, id: &InvitationId) -> Result<(), StoreError> {
        let res = sqlx::query(
            "UPDATE invitations SET status='accepted' WHERE id=? AND status='pending'",
        )
        .bind(id.0.to_string())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        if res.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn accept_invitation(
        &self,
        id: &InvitationId,
        principal: &PrincipalId,
        role: Role,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let res = sqlx::query(
            "UPDATE invitations SET status='accepted' WHERE id=? AND status='pending'",
        )
        .bind(id.0.to_string())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;
        if res.rows_affected() == 0 {
            // Already consumed by a concurrent redeemer.
            return Err(StoreError::Conflict);
        }

        let itinerary_id = sqlx::query_as::<_, (String,)>(
            "SELECT itinerary_id FROM invitations WHERE id=?",
        )
        .bind(id.0.to_string())
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        sqlx::query(
            "INSERT INTO collaborators(itinerary_id,principal_id,role,added_at) VALUES(?,?,?,?)",
        )
        .bind(&itinerary_id.0)
        .bind(principal.0.to_string())
        .bind(role.as_str())
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::Conflict
            } else {
                StoreError::Backend(s)
            }
        })?;

        tx.commit().await.map_err(backend)
    }

    async fn delete_invitation(&self, id: &InvitationId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM invitations WHERE id=?")
            .bind(id.0.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn sweep_expired_invitations(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let res = sqlx::query(
            "UPDATE invitations SET status='expired' WHERE status='pending' AND expires_at <= ?",
        )
        .bind(now.timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(res.rows_affected())
    }
}

// ───────────────────────────── Row helpers ────────────────────────────────

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_principal_id(s: &str) -> Result<PrincipalId, StoreError> {
    Uuid::try_parse(s)
        .map(PrincipalId)
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn parse_role(s: &str) -> Result<Role, StoreError> {
    s.parse().map_err(|e: felttrip_storage::ParseRoleError| {
        StoreError::Backend(e.to_string())
    })
}

fn parse_ts(ts: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(ts, 0).ok_or_else(|| StoreError::Backend("bad timestamp".into()))
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    s.parse().map_err(|_| StoreError::Backend(format!("bad date: {}", s)))
}

fn kind_from_str(s: &str) -> ItemKind {
    match s {
        "destination" => ItemKind::Destination,
        "tournament" => ItemKind::Tournament,
        other => ItemKind::Other(other.to_string()),
    }
}

async fn insert_item(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    id: &ItineraryId,
    item: &Item,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT OR IGNORE INTO items(itinerary_id,item_id,name,kind,location,date,buy_in_cents,priority)
         VALUES(?,?,?,?,?,?,?,?)",
    )
    .bind(id.0.to_string())
    .bind(&item.id)
    .bind(&item.name)
    .bind(item.kind.label())
    .bind(&item.location)
    .bind(item.date.map(|d| d.to_string()))
    .bind(item.buy_in_cents)
    .bind(&item.priority)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;
    Ok(())
}

async fn touch(pool: &SqlitePool, id: &ItineraryId) -> Result<(), StoreError> {
    sqlx::query("UPDATE itineraries SET updated_at=? WHERE id=?")
        .bind(Utc::now().timestamp())
        .bind(id.0.to_string())
        .execute(pool)
        .await
        .map_err(backend)?;
    Ok(())
}

type InvitationRow = (String, String, String, String, i64, i64, String, String);

fn invitation_from_row(token: &str, row: InvitationRow) -> Result<Invitation, StoreError> {
    let (id, itinerary_id, email, role, created_at, expires_at, status, invited_by) = row;
    Ok(Invitation {
        id: InvitationId(Uuid::try_parse(&id).map_err(|e| StoreError::Backend(e.to_string()))?),
        itinerary_id: ItineraryId(
            Uuid::try_parse(&itinerary_id).map_err(|e| StoreError::Backend(e.to_string()))?,
        ),
        email,
        role: parse_role(&role)?,
        token: token.to_string(),
        created_at: parse_ts(created_at)?,
        expires_at: parse_ts(expires_at)?,
        status: status
            .parse()
            .map_err(|e: felttrip_storage::ParseInvitationStatusError| {
                StoreError::Backend(e.to_string())
            })?,
        invited_by: parse_principal_id(&invited_by)?,
    })
}
