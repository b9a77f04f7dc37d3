//! Walkthrough of the QueryView API.
//!
//! This example demonstrates:
//! - Creating a database and a table
//! - Filtering, projecting and sorting views
//! - Building derived columns with expressions
//! - Grouping with aggregates
//! - Sampling and saving results

use query_engine::{Aggregate, Database, Value};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Opening in-memory database...");
    let db = Database::open_in_memory()?;

    let users = db.create_table(
        "users",
        &["id", "name", "age", "city"],
        &[
            vec![Value::from(1), Value::from("Alice"), Value::from(30), Value::from("NYC")],
            vec![Value::from(2), Value::from("Bob"), Value::from(25), Value::from("LA")],
            vec![Value::from(3), Value::from("Charlie"), Value::from(35), Value::from("NYC")],
            vec![Value::from(4), Value::from("Diana"), Value::from(28), Value::from("SF")],
        ],
    )?;
    println!("{}\n", users.summary()?);

    // SELECT name, age FROM users WHERE age > 27 ORDER BY age DESC
    let age = users.column("age")?;
    let older = users
        .filter(age.gt(27)?)?
        .select(&["name", "age"])?
        .sort("age", true)?;
    println!("Query: {}", older.formulate());
    println!("{}", older.to_frame()?);

    // Derived column: age in months
    let months = users.with_column("months", age.mul(12)?)?.select(&["name", "months"])?;
    println!("Query: {}", months.formulate());
    println!("{}", months.to_frame()?);

    // SELECT city, COUNT(...) FROM users GROUP BY city
    let per_city = users
        .select(&["city", "id"])?
        .group("city", None, Some(Aggregate::Count))?;
    println!("Query: {}", per_city.formulate());
    println!("{}", per_city.to_frame()?);

    // Combined predicate: age >= 25 AND city = 'NYC'
    let nyc = age.gt_eq(25)?.and(&users.column("city")?.eq("NYC")?)?;
    let nyc_users = users.filter(nyc)?;
    println!("{} users match {}", nyc_users.len()?, nyc_users.formulate());

    println!("\nSample of 2 rows:");
    println!("{}", users.sample(2)?);

    let saved = nyc_users.save_as("nyc_users")?;
    saved.show()?;
    println!("{}", db);

    Ok(())
}
