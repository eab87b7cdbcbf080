//! Database Module
//!
//! 커밋된 엔진 이벤트 인덱싱 (선택 사항).
//!
//! `DATABASE_URL`이 없으면 이 모듈은 사용되지 않고 히스토리는 메모리에서
//! 제공된다. 인덱싱 실패는 로그만 남기며, 엔진 상태에는 영향이 없다.
//!
//! # Connection Pool
//! SQLx `PgPool` (최소/최대 커넥션, 획득 타임아웃)

mod models;
mod repository;

pub use models::*;
use anyhow::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// 데이터베이스 연결 및 쿼리 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 포지션 히스토리 조회 (페이지네이션, 최신순)
    ///
    /// 계정이 당사자 또는 상대방인 이벤트 모두 포함
    pub async fn get_position_history(
        &self,
        address: &str,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<PositionEvent>, i64)> {
        let offset = page as i64 * limit as i64;

        // 이벤트 조회
        let events = sqlx::query_as::<_, PositionEvent>(
            r#"
            SELECT
                sequence,
                event_type,
                address,
                counterparty,
                token,
                amount,
                collateral_seized,
                timestamp
            FROM position_events
            WHERE address = $1 OR counterparty = $1
            ORDER BY timestamp DESC, sequence DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(address.to_lowercase())
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        // 전체 개수
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM position_events WHERE address = $1 OR counterparty = $1"
        )
        .bind(address.to_lowercase())
        .fetch_one(&self.pool)
        .await?;

        Ok((events, count.0))
    }

    /// 포지션 생성/업데이트 (upsert)
    pub async fn upsert_position(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                address, collateral_value_usd, total_dsc_minted,
                health_factor, status, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (address)
            DO UPDATE SET
                collateral_value_usd = EXCLUDED.collateral_value_usd,
                total_dsc_minted = EXCLUDED.total_dsc_minted,
                health_factor = EXCLUDED.health_factor,
                status = EXCLUDED.status,
                updated_at = NOW()
            "#
        )
        .bind(&position.address)
        .bind(&position.collateral_value_usd)
        .bind(&position.total_dsc_minted)
        .bind(&position.health_factor)
        .bind(&position.status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 이벤트 저장
    pub async fn insert_event(&self, event: &PositionEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO position_events (
                sequence, event_type, address, counterparty, token,
                amount, collateral_seized, timestamp
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#
        )
        .bind(event.sequence)
        .bind(&event.event_type)
        .bind(event.address.to_lowercase())
        .bind(event.counterparty.as_ref().map(|c| c.to_lowercase()))
        .bind(&event.token)
        .bind(&event.amount)
        .bind(&event.collateral_seized)
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
