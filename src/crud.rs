use sqlx::{query, query_as, query_scalar, Pool, Postgres};

use crate::{
    error::StoreError,
    model::{ChallengeModel, MatchModel},
    schema::{Challenge, GroupId, MatchKey, MatchRecord, PlayerId, Side},
};

pub async fn crud_get_match(
    db: &Pool<Postgres>,
    key: &MatchKey,
) -> Result<Option<MatchModel>, StoreError> {
    let m: Option<MatchModel> = query_as(
        r#"
        SELECT *
        FROM games
        WHERE group_id = $1 AND white_id = $2 AND black_id = $3
        "#,
    )
    .bind(key.group)
    .bind(key.white)
    .bind(key.black)
    .fetch_optional(db)
    .await?;

    Ok(m)
}

/// Inserts `fresh` unless a row for its key exists, then returns the stored row.
pub async fn crud_get_or_create_match(
    db: &Pool<Postgres>,
    fresh: &MatchRecord,
) -> Result<MatchModel, StoreError> {
    query(
        r#"
        INSERT INTO games (group_id, white_id, black_id, board, turn, pawn_move, moved, draw, white_name, black_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (group_id, white_id, black_id) DO NOTHING
        "#,
    )
    .bind(fresh.key.group)
    .bind(fresh.key.white)
    .bind(fresh.key.black)
    .bind(&fresh.board)
    .bind(fresh.turn)
    .bind(&fresh.pawn_move)
    .bind(&fresh.moved)
    .bind(fresh.draw)
    .bind(&fresh.names.white)
    .bind(&fresh.names.black)
    .execute(db)
    .await?;

    crud_get_match(db, &fresh.key)
        .await?
        .ok_or(StoreError::NotFound(fresh.key))
}

pub async fn crud_upsert_match(db: &Pool<Postgres>, record: &MatchRecord) -> Result<(), StoreError> {
    query(
        r#"
        INSERT INTO games (group_id, white_id, black_id, board, turn, pawn_move, moved, draw, white_name, black_name)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (group_id, white_id, black_id) DO UPDATE SET
            board = EXCLUDED.board,
            turn = EXCLUDED.turn,
            pawn_move = EXCLUDED.pawn_move,
            moved = EXCLUDED.moved,
            draw = EXCLUDED.draw,
            white_name = EXCLUDED.white_name,
            black_name = EXCLUDED.black_name,
            updated_at = NOW()
        "#,
    )
    .bind(record.key.group)
    .bind(record.key.white)
    .bind(record.key.black)
    .bind(&record.board)
    .bind(record.turn)
    .bind(&record.pawn_move)
    .bind(&record.moved)
    .bind(record.draw)
    .bind(&record.names.white)
    .bind(&record.names.black)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn crud_update_draw(
    db: &Pool<Postgres>,
    key: &MatchKey,
    draw: Option<Side>,
) -> Result<(), StoreError> {
    let result = query(
        r#"
        UPDATE games SET draw = $4, updated_at = NOW()
        WHERE group_id = $1 AND white_id = $2 AND black_id = $3
        "#,
    )
    .bind(key.group)
    .bind(key.white)
    .bind(key.black)
    .bind(draw)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(*key));
    }
    Ok(())
}

pub async fn crud_delete_match(db: &Pool<Postgres>, key: &MatchKey) -> Result<(), StoreError> {
    query(r#"DELETE FROM games WHERE group_id = $1 AND white_id = $2 AND black_id = $3"#)
        .bind(key.group)
        .bind(key.white)
        .bind(key.black)
        .execute(db)
        .await?;

    Ok(())
}

/// Looks a match up by unordered pair.
pub async fn crud_find_match(
    db: &Pool<Postgres>,
    group: GroupId,
    a: PlayerId,
    b: PlayerId,
) -> Result<Option<MatchModel>, StoreError> {
    let m: Option<MatchModel> = query_as(
        r#"
        SELECT *
        FROM games
        WHERE group_id = $1 AND (
            (white_id = $2 AND black_id = $3) OR
            (white_id = $3 AND black_id = $2)
        )
        LIMIT 1
        "#,
    )
    .bind(group)
    .bind(a)
    .bind(b)
    .fetch_optional(db)
    .await?;

    Ok(m)
}

pub async fn crud_get_opponents(
    db: &Pool<Postgres>,
    group: GroupId,
    player: PlayerId,
) -> Result<Vec<PlayerId>, StoreError> {
    let opponents: Vec<PlayerId> = query_scalar(
        r#"
        SELECT CASE WHEN white_id = $2 THEN black_id ELSE white_id END
        FROM games
        WHERE group_id = $1 AND (white_id = $2 OR black_id = $2)
        ORDER BY created_at, white_id, black_id
        "#,
    )
    .bind(group)
    .bind(player)
    .fetch_all(db)
    .await?;

    Ok(opponents)
}

/// Looks a challenge up by unordered pair.
pub async fn crud_find_challenge(
    db: &Pool<Postgres>,
    group: GroupId,
    a: PlayerId,
    b: PlayerId,
) -> Result<Option<ChallengeModel>, StoreError> {
    let c: Option<ChallengeModel> = query_as(
        r#"
        SELECT group_id, challenger, challenged, created_at
        FROM challenges
        WHERE group_id = $1 AND (
            (challenger = $2 AND challenged = $3) OR
            (challenger = $3 AND challenged = $2)
        )
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(group)
    .bind(a)
    .bind(b)
    .fetch_optional(db)
    .await?;

    Ok(c)
}

pub async fn crud_create_challenge(
    db: &Pool<Postgres>,
    challenge: &Challenge,
) -> Result<(), StoreError> {
    query(
        r#"
        INSERT INTO challenges (group_id, challenger, challenged)
        VALUES ($1, $2, $3)
        ON CONFLICT (group_id, challenger, challenged) DO NOTHING
        "#,
    )
    .bind(challenge.group)
    .bind(challenge.challenger)
    .bind(challenge.challenged)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn crud_delete_challenge(
    db: &Pool<Postgres>,
    challenge: &Challenge,
) -> Result<(), StoreError> {
    query(r#"DELETE FROM challenges WHERE group_id = $1 AND challenger = $2 AND challenged = $3"#)
        .bind(challenge.group)
        .bind(challenge.challenger)
        .bind(challenge.challenged)
        .execute(db)
        .await?;

    Ok(())
}
