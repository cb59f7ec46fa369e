//! Initial schema: users, groups, expenses, splits and payments.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(INITIAL_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const INITIAL_SQL: &str = r"
CREATE TYPE split_strategy AS ENUM ('equally', 'unequal', 'percentage', 'shares');
CREATE TYPE payment_status AS ENUM ('pending', 'completed', 'failed');

-- Users and groups are owned by external services; only the columns the
-- ledger reads are kept here.
CREATE TABLE users (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    email VARCHAR(255) NOT NULL UNIQUE,
    display_name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE groups (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE group_members (
    group_id UUID NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    joined_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (group_id, user_id)
);

CREATE INDEX idx_group_members_user ON group_members(user_id);

CREATE TABLE expenses (
    id UUID PRIMARY KEY,
    group_id UUID NOT NULL REFERENCES groups(id),
    payer_id UUID NOT NULL REFERENCES users(id),
    amount NUMERIC(19, 2) NOT NULL,
    description TEXT,
    split_strategy split_strategy NOT NULL,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    CONSTRAINT chk_expense_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_expense_version_positive CHECK (version > 0)
);

CREATE INDEX idx_expenses_group ON expenses(group_id, created_at) WHERE deleted_at IS NULL;

CREATE TABLE expense_splits (
    id UUID PRIMARY KEY,
    expense_id UUID NOT NULL REFERENCES expenses(id) ON DELETE CASCADE,
    user_id UUID NOT NULL REFERENCES users(id),
    amount_paid NUMERIC(19, 2) NOT NULL,
    amount_owed NUMERIC(19, 2) NOT NULL,
    split_ratio NUMERIC(19, 4) NOT NULL,
    position INTEGER NOT NULL,
    version BIGINT NOT NULL DEFAULT 1,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_expense_split_user UNIQUE (expense_id, user_id),
    CONSTRAINT uq_expense_split_position UNIQUE (expense_id, position),
    CONSTRAINT chk_split_paid_non_negative CHECK (amount_paid >= 0),
    CONSTRAINT chk_split_owed_non_negative CHECK (amount_owed >= 0)
);

CREATE INDEX idx_expense_splits_user ON expense_splits(user_id);

CREATE TABLE payments (
    id UUID PRIMARY KEY,
    expense_id UUID REFERENCES expenses(id),
    payer_id UUID NOT NULL REFERENCES users(id),
    payee_id UUID NOT NULL REFERENCES users(id),
    amount NUMERIC(19, 2) NOT NULL,
    status payment_status NOT NULL DEFAULT 'pending',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_amount_positive CHECK (amount > 0),
    CONSTRAINT chk_payment_distinct_parties CHECK (payer_id <> payee_id)
);

CREATE INDEX idx_payments_expense ON payments(expense_id, created_at);

-- ============================================================
-- FUNCTION: prevent_settled_payment_modification
-- Completed and failed payments are immutable; pending ones may
-- only move to completed or failed.
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_settled_payment_modification()
RETURNS TRIGGER AS $$
BEGIN
    IF OLD.status IN ('completed', 'failed') THEN
        RAISE EXCEPTION 'Cannot modify % payment.', OLD.status;
    END IF;

    IF NEW.status = 'pending' AND (NEW.amount <> OLD.amount
        OR NEW.payer_id <> OLD.payer_id OR NEW.payee_id <> OLD.payee_id) THEN
        RAISE EXCEPTION 'Pending payment parties and amount are fixed.';
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_prevent_settled_payment_mod
BEFORE UPDATE ON payments
FOR EACH ROW
EXECUTE FUNCTION prevent_settled_payment_modification();
";

const DROP_SQL: &str = r"
DROP TABLE IF EXISTS payments CASCADE;
DROP FUNCTION IF EXISTS prevent_settled_payment_modification();
DROP TABLE IF EXISTS expense_splits CASCADE;
DROP TABLE IF EXISTS expenses CASCADE;
DROP TABLE IF EXISTS group_members CASCADE;
DROP TABLE IF EXISTS groups CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TYPE IF EXISTS payment_status;
DROP TYPE IF EXISTS split_strategy;
";
