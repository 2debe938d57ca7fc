use diesel::prelude::*;

use crate::database::{DbPool, get_db_conn};
use crate::error::VaultResult;
use crate::models::users::{NewUser, User};
use crate::schema::users::dsl::*;

/// Returns the user registered for `new_user`'s provider identity, inserting
/// it on first sign-in. The second value is true when a row was created.
pub fn find_or_create_user(pool: &DbPool, new_user: &NewUser) -> VaultResult<(User, bool)> {
    let mut conn = get_db_conn(pool)?;

    let found = conn.transaction::<_, diesel::result::Error, _>(|conn| {
        let existing = users
            .filter(oauth_provider.eq(&new_user.oauth_provider))
            .filter(oauth_user_id.eq(&new_user.oauth_user_id))
            .first::<User>(conn)
            .optional()?;

        match existing {
            Some(user) => Ok((user, false)),
            None => diesel::insert_into(users)
                .values(new_user)
                .get_result::<User>(conn)
                .map(|user| (user, true)),
        }
    })?;
    Ok(found)
}
