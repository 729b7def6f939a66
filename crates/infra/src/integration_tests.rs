//! Store-level tests for the versioned book store and the account/token
//! layer.
//!
//! Every scenario is written once against `Models` and run on the in-memory
//! stores. The same scenarios run against Postgres when
//! `BOOKSHELF_TEST_DB_DSN` is set and ignored tests are requested.
//!
//! Verifies:
//! - Insert assigns version 1 and get returns what was inserted
//! - Compare-and-increment rejects a stale version without side effects
//! - Token issue/resolve, expiry, tampering and revocation

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use bookshelf_auth::{NewUser, PasswordHash, TokenScope, User};
    use bookshelf_catalog::{BookFields, Pages, SORT_SAFELIST};
    use bookshelf_core::{BookId, Filters};

    use crate::books::BookFilter;
    use crate::db::DbConfig;
    use crate::error::StoreError;
    use crate::models::Models;

    // bcrypt's minimum cost keeps these fast.
    const TEST_COST: u32 = 4;

    fn unique_suffix() -> String {
        Utc::now().timestamp_nanos_opt().unwrap_or_default().to_string()
    }

    fn book(isbn: &str, title: &str, author: &str, year: i32) -> BookFields {
        BookFields {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: author.to_string(),
            genres: vec!["fiction".to_string()],
            pages: Pages(300),
            language: "English".to_string(),
            publisher: "Penguin".to_string(),
            year,
        }
    }

    async fn register(models: &Models, activated: bool) -> User {
        let new_user = NewUser {
            name: "Test User".to_string(),
            email: format!("user-{}@example.com", unique_suffix()),
            password_hash: PasswordHash::with_cost("pa55word!", TEST_COST).unwrap(),
            activated,
        };
        models.users.insert(new_user).await.unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scenarios
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_then_get_round_trips(models: Models) {
        let fields = book("9780141439518", "Pride and Prejudice", "Jane Austen", 1813);
        let inserted = models.books.insert(fields.clone()).await.unwrap();
        assert!(inserted.id.is_assignable());
        assert_eq!(inserted.version, 1);

        let fetched = models.books.get(inserted.id).await.unwrap();
        assert_eq!(fetched.id, inserted.id);
        assert_eq!(fetched.fields, fields);
        assert_eq!(fetched.version, 1);
    }

    async fn stale_update_is_an_edit_conflict(models: Models) {
        let inserted = models
            .books
            .insert(book("9780141439600", "A Tale of Two Cities", "Charles Dickens", 1859))
            .await
            .unwrap();

        let mut first = inserted.clone();
        first.fields.pages = Pages(489);
        let mut second = inserted.clone();
        second.fields.title = "Lost Update".to_string();

        assert_eq!(models.books.update(&first).await.unwrap(), 2);
        assert_eq!(models.books.update(&second).await, Err(StoreError::EditConflict));

        let stored = models.books.get(inserted.id).await.unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.fields.pages, Pages(489));
        assert_eq!(stored.fields.title, "A Tale of Two Cities");
    }

    async fn concurrent_updates_admit_one_winner(models: Models) {
        let inserted = models
            .books
            .insert(book("9780140449136", "Crime and Punishment", "Fyodor Dostoevsky", 1866))
            .await
            .unwrap();

        let attempts = (0..8).map(|n| {
            let books = models.books.clone();
            let mut candidate = inserted.clone();
            candidate.fields.pages = Pages(500 + n);
            tokio::spawn(async move { books.update(&candidate).await })
        });
        let mut wins = 0;
        for handle in attempts.collect::<Vec<_>>() {
            match handle.await.unwrap() {
                Ok(version) => {
                    assert_eq!(version, 2);
                    wins += 1;
                }
                Err(err) => assert_eq!(err, StoreError::EditConflict),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(models.books.get(inserted.id).await.unwrap().version, 2);
    }

    async fn delete_then_get_is_not_found(models: Models) {
        let inserted = models
            .books
            .insert(book("9780743273565", "The Great Gatsby", "F. Scott Fitzgerald", 1925))
            .await
            .unwrap();

        models.books.delete(inserted.id).await.unwrap();
        assert_eq!(models.books.get(inserted.id).await, Err(StoreError::NotFound));
        assert_eq!(models.books.delete(inserted.id).await, Err(StoreError::NotFound));
    }

    async fn update_of_missing_row_reports_edit_conflict(models: Models) {
        let inserted = models
            .books
            .insert(book("9780451524935", "1984", "George Orwell", 1949))
            .await
            .unwrap();
        models.books.delete(inserted.id).await.unwrap();

        assert_eq!(models.books.update(&inserted).await, Err(StoreError::EditConflict));
    }

    async fn non_positive_ids_are_not_found(models: Models) {
        assert_eq!(models.books.get(BookId::new(0)).await, Err(StoreError::NotFound));
        assert_eq!(models.books.delete(BookId::new(-3)).await, Err(StoreError::NotFound));
    }

    async fn listing_filters_sorts_and_paginates(models: Models) {
        let isbn = format!("97{:0>11}", unique_suffix().chars().rev().take(11).collect::<String>());
        for (title, year) in [("Alpha Rising", 2001), ("Beta Falling", 1999), ("Gamma Rising", 2010)] {
            models.books.insert(book(&isbn, title, "Ann Author", year)).await.unwrap();
        }

        let filter = BookFilter {
            isbn: isbn.clone(),
            ..BookFilter::default()
        };
        let (page, metadata) = models
            .books
            .list(&filter, &Filters::new(1, 2, "-year", SORT_SAFELIST))
            .await
            .unwrap();
        let years: Vec<i32> = page.iter().map(|b| b.fields.year).collect();
        assert_eq!(years, vec![2010, 2001]);
        assert_eq!(metadata.total_records, 3);
        assert_eq!(metadata.last_cursor, 2);

        let (page, _) = models
            .books
            .list(&filter, &Filters::new(2, 2, "-year", SORT_SAFELIST))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].fields.year, 1999);

        let rising = BookFilter {
            isbn: isbn.clone(),
            title: "rising".to_string(),
            ..BookFilter::default()
        };
        let (page, metadata) = models
            .books
            .list(&rising, &Filters::new(1, 20, "title", SORT_SAFELIST))
            .await
            .unwrap();
        let titles: Vec<&str> = page.iter().map(|b| b.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha Rising", "Gamma Rising"]);
        assert_eq!(metadata.total_records, 2);

        let nothing = BookFilter {
            isbn,
            genres: vec!["fiction".to_string(), "poetry".to_string()],
            ..BookFilter::default()
        };
        let (page, metadata) = models
            .books
            .list(&nothing, &Filters::new(1, 20, "id", SORT_SAFELIST))
            .await
            .unwrap();
        assert!(page.is_empty());
        assert!(metadata.is_empty());
    }

    async fn unsafe_sort_is_rejected(models: Models) {
        let filters = Filters::new(1, 20, "title; DROP TABLE books", SORT_SAFELIST);
        let err = models.books.list(&BookFilter::default(), &filters).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidSort(_)));
    }

    async fn duplicate_email_is_rejected(models: Models) {
        let user = register(&models, false).await;
        let again = NewUser {
            name: "Someone Else".to_string(),
            email: user.email.clone(),
            password_hash: PasswordHash::from_stored(user.password_hash.as_str()),
            activated: false,
        };
        assert_eq!(models.users.insert(again).await, Err(StoreError::DuplicateEmail));
        assert_eq!(models.users.get_by_email(&user.email).await.unwrap().id, user.id);
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    async fn email_lookups_do_not_log_the_address(models: Models) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let user = register(&models, false).await;
        let again = NewUser {
            name: "Someone Else".to_string(),
            email: user.email.clone(),
            password_hash: PasswordHash::from_stored(user.password_hash.as_str()),
            activated: false,
        };
        assert_eq!(models.users.insert(again).await, Err(StoreError::DuplicateEmail));

        let missing = format!("nobody-{}@example.com", unique_suffix());
        assert_eq!(models.users.get_by_email(&missing).await, Err(StoreError::NotFound));

        let output = logs.contents();
        assert!(!output.contains(&user.email), "{output}");
        assert!(!output.contains(&missing), "{output}");
    }

    async fn issued_token_resolves_until_expiry(models: Models) {
        let user = register(&models, true).await;
        let token = models
            .tokens
            .issue(user.id, Duration::hours(24), TokenScope::Authentication)
            .await
            .unwrap();
        let auth = models.authenticator();

        let resolved = auth.resolve(&token.plaintext, Utc::now()).await.unwrap();
        assert_eq!(resolved.id, user.id);

        let later = Utc::now() + Duration::hours(25);
        assert_eq!(auth.resolve(&token.plaintext, later).await, Err(StoreError::NotFound));
    }

    async fn altered_token_is_not_found(models: Models) {
        let user = register(&models, true).await;
        let token = models
            .tokens
            .issue(user.id, Duration::hours(1), TokenScope::Authentication)
            .await
            .unwrap();

        let mut altered: Vec<char> = token.plaintext.chars().collect();
        altered[0] = if altered[0] == 'A' { 'B' } else { 'A' };
        let altered: String = altered.into_iter().collect();

        let auth = models.authenticator();
        assert_eq!(auth.resolve(&altered, Utc::now()).await, Err(StoreError::NotFound));
    }

    async fn activation_token_does_not_authenticate(models: Models) {
        let user = register(&models, false).await;
        let token = models
            .tokens
            .issue(user.id, Duration::hours(72), TokenScope::Activation)
            .await
            .unwrap();

        let auth = models.authenticator();
        assert_eq!(auth.resolve(&token.plaintext, Utc::now()).await, Err(StoreError::NotFound));

        let hash = bookshelf_auth::TokenHash::of(&token.plaintext);
        let owner = models
            .users
            .get_for_token(TokenScope::Activation, &hash, Utc::now())
            .await
            .unwrap();
        assert_eq!(owner.id, user.id);

        models
            .tokens
            .delete_all_for_user(TokenScope::Activation, user.id)
            .await
            .unwrap();
        assert_eq!(
            models.users.get_for_token(TokenScope::Activation, &hash, Utc::now()).await,
            Err(StoreError::NotFound)
        );
    }

    async fn revoke_all_logs_out_everywhere(models: Models) {
        let user = register(&models, true).await;
        let mut tokens = Vec::new();
        for _ in 0..3 {
            tokens.push(
                models
                    .tokens
                    .issue(user.id, Duration::hours(24), TokenScope::Authentication)
                    .await
                    .unwrap(),
            );
        }

        models.tokens.revoke_all(user.id).await.unwrap();
        models.tokens.revoke_all(user.id).await.unwrap();

        let auth = models.authenticator();
        for token in tokens {
            assert_eq!(auth.resolve(&token.plaintext, Utc::now()).await, Err(StoreError::NotFound));
        }
    }

    async fn page_past_the_end_has_empty_metadata(models: Models) {
        let isbn = format!("96{:0>11}", unique_suffix().chars().rev().take(11).collect::<String>());
        for title in ["One", "Two", "Three"] {
            models.books.insert(book(&isbn, title, "Ann Author", 2000)).await.unwrap();
        }
        let filter = BookFilter {
            isbn,
            ..BookFilter::default()
        };

        for cursor in [5, i64::MAX / 2] {
            let (page, metadata) = models
                .books
                .list(&filter, &Filters::new(cursor, 20, "id", SORT_SAFELIST))
                .await
                .unwrap();
            assert!(page.is_empty());
            assert!(metadata.is_empty(), "cursor {cursor}: {metadata:?}");
        }
    }

    async fn user_update_is_compare_and_increment(models: Models) {
        let user = register(&models, false).await;
        let mut activated = user.clone();
        activated.activated = true;

        assert_eq!(models.users.update(&activated).await.unwrap(), 2);
        assert_eq!(models.users.update(&activated).await, Err(StoreError::EditConflict));

        let stored = models.users.get_by_email(&user.email).await.unwrap();
        assert!(stored.activated);
        assert_eq!(stored.version, 2);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory
    // ─────────────────────────────────────────────────────────────────────────

    macro_rules! in_memory_tests {
        ($($scenario:ident),* $(,)?) => {
            mod in_memory {
                $(
                    #[tokio::test]
                    async fn $scenario() {
                        super::$scenario(super::Models::in_memory()).await;
                    }
                )*
            }
        };
    }

    in_memory_tests!(
        insert_then_get_round_trips,
        stale_update_is_an_edit_conflict,
        concurrent_updates_admit_one_winner,
        delete_then_get_is_not_found,
        update_of_missing_row_reports_edit_conflict,
        non_positive_ids_are_not_found,
        listing_filters_sorts_and_paginates,
        page_past_the_end_has_empty_metadata,
        unsafe_sort_is_rejected,
        duplicate_email_is_rejected,
        email_lookups_do_not_log_the_address,
        issued_token_resolves_until_expiry,
        altered_token_is_not_found,
        activation_token_does_not_authenticate,
        revoke_all_logs_out_everywhere,
        user_update_is_compare_and_increment,
    );

    // ─────────────────────────────────────────────────────────────────────────
    // Postgres (requires BOOKSHELF_TEST_DB_DSN)
    // ─────────────────────────────────────────────────────────────────────────

    async fn postgres_models() -> Models {
        let dsn = std::env::var("BOOKSHELF_TEST_DB_DSN")
            .expect("BOOKSHELF_TEST_DB_DSN must be set to run Postgres tests");
        Models::postgres(&DbConfig::new(dsn)).await.unwrap()
    }

    macro_rules! postgres_tests {
        ($($scenario:ident),* $(,)?) => {
            mod postgres {
                $(
                    #[tokio::test]
                    #[ignore = "requires BOOKSHELF_TEST_DB_DSN"]
                    async fn $scenario() {
                        super::$scenario(super::postgres_models().await).await;
                    }
                )*
            }
        };
    }

    postgres_tests!(
        insert_then_get_round_trips,
        stale_update_is_an_edit_conflict,
        concurrent_updates_admit_one_winner,
        delete_then_get_is_not_found,
        update_of_missing_row_reports_edit_conflict,
        non_positive_ids_are_not_found,
        listing_filters_sorts_and_paginates,
        page_past_the_end_has_empty_metadata,
        unsafe_sort_is_rejected,
        duplicate_email_is_rejected,
        email_lookups_do_not_log_the_address,
        issued_token_resolves_until_expiry,
        altered_token_is_not_found,
        activation_token_does_not_authenticate,
        revoke_all_logs_out_everywhere,
        user_update_is_compare_and_increment,
    );
}
