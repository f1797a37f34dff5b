//! Cars, seats and assignments for a match.
//!
//! `cars.seats` counts the seats still free. Assigning an athlete takes a
//! seat, removing them gives it back, and each multi-step change runs in one
//! transaction so the counter and the assignment rows always agree.

use time::Date;

use crate::{
    error::{LedgerError, LedgerResult, RowKind},
    util::{required, today},
};

use super::{
    athlete::Athlete,
    car::{Assignment, Car, CarPassengers},
    db::{require_row, LedgerDb, MATCH_SELECT},
    fixture::Match,
};

fn validate_car(driver: &str, contact: &str, seats: i64) -> LedgerResult<(String, String)> {
    let driver = required("driver", driver)?;
    let contact = required("driver contact", contact)?;
    if seats < 1 {
        return Err(LedgerError::Validation(format!(
            "a car needs at least 1 seat, got {}",
            seats
        )));
    }
    Ok((driver, contact))
}

impl LedgerDb {
    /// The next match on or after today, optionally for one team.
    pub async fn fetch_next_match(&self, team: Option<i64>) -> LedgerResult<Option<Match>> {
        self.fetch_next_match_from(team, today()).await
    }

    /// The earliest match dated `today` or later. Ties go to the lowest id.
    pub async fn fetch_next_match_from(
        &self,
        team: Option<i64>,
        today: Date,
    ) -> LedgerResult<Option<Match>> {
        let next = match team {
            Some(team) => {
                sqlx::query_as(&format!(
                    "{} where m.date >= ? and m.team_id = ? order by m.date, m.id limit 1",
                    MATCH_SELECT
                ))
                .bind(today)
                .bind(team)
                .fetch_optional(&self.db)
                .await?
            }
            None => {
                sqlx::query_as(&format!(
                    "{} where m.date >= ? order by m.date, m.id limit 1",
                    MATCH_SELECT
                ))
                .bind(today)
                .fetch_optional(&self.db)
                .await?
            }
        };
        Ok(next)
    }

    /// Offers a new car for a match with `seats` free seats.
    pub async fn add_car(
        &self,
        match_id: i64,
        driver: &str,
        contact: &str,
        seats: i64,
    ) -> LedgerResult<Car> {
        let (driver, contact) = validate_car(driver, contact, seats)?;
        log::debug!("Adding car of {} with {} seats to match {}", driver, seats, match_id);

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Match, match_id).await?;
        let id = sqlx::query("insert into cars(match_id, driver, contact, seats) values(?, ?, ?, ?)")
            .bind(match_id)
            .bind(&driver)
            .bind(&contact)
            .bind(seats)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        tx.commit().await?;

        Ok(Car {
            id,
            match_id,
            driver,
            contact,
            seats,
        })
    }

    /// Overwrites a car's details.
    ///
    /// `seats` replaces the free-seat counter as given; it is not checked
    /// against the athletes already riding in the car.
    pub async fn update_car(
        &self,
        car_id: i64,
        driver: &str,
        contact: &str,
        seats: i64,
    ) -> LedgerResult<()> {
        let (driver, contact) = validate_car(driver, contact, seats)?;
        log::debug!("Updating car {}", car_id);

        let updated = sqlx::query("update cars set driver = ?, contact = ?, seats = ? where id = ?")
            .bind(&driver)
            .bind(&contact)
            .bind(seats)
            .bind(car_id)
            .execute(&self.db)
            .await?
            .rows_affected();

        if updated == 0 {
            Err(LedgerError::not_found(RowKind::Car, car_id))
        } else {
            Ok(())
        }
    }

    /// Deletes a car and every assignment to it. Unknown ids are ignored.
    pub async fn delete_car(&self, car_id: i64) -> LedgerResult<()> {
        log::debug!("Deleting car {}", car_id);

        let mut tx = self.db.begin().await?;
        sqlx::query("delete from assignments where car_id = ?")
            .bind(car_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("delete from cars where id = ?")
            .bind(car_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Seats an athlete in a car, moving them out of any other car they
    /// held for the same match.
    pub async fn assign_athlete(
        &self,
        match_id: i64,
        car_id: i64,
        athlete_id: i64,
    ) -> LedgerResult<()> {
        log::debug!(
            "Assigning athlete {} to car {} for match {}",
            athlete_id,
            car_id,
            match_id
        );

        let mut tx = self.db.begin().await?;
        require_row(&mut tx, RowKind::Match, match_id).await?;
        require_row(&mut tx, RowKind::Athlete, athlete_id).await?;

        let car: Car = sqlx::query_as("select * from cars where id = ?")
            .bind(car_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(LedgerError::not_found(RowKind::Car, car_id))?;

        if car.match_id != match_id {
            return Err(LedgerError::Validation(format!(
                "car {} does not drive to match {}",
                car_id, match_id
            )));
        }

        let previous: Option<i64> =
            sqlx::query_scalar("select car_id from assignments where match_id = ? and athlete_id = ?")
                .bind(match_id)
                .bind(athlete_id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(previous) = previous {
            sqlx::query("delete from assignments where match_id = ? and athlete_id = ?")
                .bind(match_id)
                .bind(athlete_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("update cars set seats = seats + 1 where id = ?")
                .bind(previous)
                .execute(&mut *tx)
                .await?;
        }

        let car: Car = sqlx::query_as("select * from cars where id = ?")
            .bind(car_id)
            .fetch_one(&mut *tx)
            .await?;

        if !car.has_free_seat() {
            return Err(LedgerError::Validation(format!("car {} is full", car_id)));
        }

        sqlx::query("insert into assignments(match_id, car_id, athlete_id) values(?, ?, ?)")
            .bind(match_id)
            .bind(car_id)
            .bind(athlete_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("update cars set seats = seats - 1 where id = ?")
            .bind(car_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Takes an athlete out of a car and frees their seat.
    ///
    /// Removing an athlete who is not in the car is a no-op.
    pub async fn remove_athlete(&self, car_id: i64, athlete_id: i64) -> LedgerResult<()> {
        log::debug!("Removing athlete {} from car {}", athlete_id, car_id);

        let mut tx = self.db.begin().await?;
        let removed = sqlx::query("delete from assignments where car_id = ? and athlete_id = ?")
            .bind(car_id)
            .bind(athlete_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if removed > 0 {
            sqlx::query("update cars set seats = seats + ? where id = ?")
                .bind(removed as i64)
                .bind(car_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Athletes without a seat for the match. With `team`, only its members.
    pub async fn fetch_available_athletes(
        &self,
        match_id: i64,
        team: Option<i64>,
    ) -> LedgerResult<Vec<Athlete>> {
        let mut athletes: Vec<Athlete> = match team {
            Some(team) => {
                sqlx::query_as(
                    "select a.id, a.name, a.contact from athletes a
                        where a.id not in (select athlete_id from assignments where match_id = ?)
                        and exists (
                            select 1 from athlete_teams m
                            where m.athlete_id = a.id and m.team_id = ?
                        )
                        order by a.name, a.id",
                )
                .bind(match_id)
                .bind(team)
                .fetch_all(&self.db)
                .await?
            }
            None => {
                sqlx::query_as(
                    "select a.id, a.name, a.contact from athletes a
                        where a.id not in (select athlete_id from assignments where match_id = ?)
                        order by a.name, a.id",
                )
                .bind(match_id)
                .fetch_all(&self.db)
                .await?
            }
        };

        self.load_teams(&mut athletes).await?;
        Ok(athletes)
    }

    /// Cars of the match that still have a free seat.
    pub async fn fetch_available_cars(&self, match_id: i64) -> LedgerResult<Vec<Car>> {
        Ok(
            sqlx::query_as("select * from cars where match_id = ? and seats > 0 order by id")
                .bind(match_id)
                .fetch_all(&self.db)
                .await?,
        )
    }

    /// Every car of the match, full or not.
    pub async fn fetch_cars_for_match(&self, match_id: i64) -> LedgerResult<Vec<Car>> {
        Ok(sqlx::query_as("select * from cars where match_id = ? order by id")
            .bind(match_id)
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn fetch_car(&self, car_id: i64) -> LedgerResult<Car> {
        sqlx::query_as("select * from cars where id = ?")
            .bind(car_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(LedgerError::not_found(RowKind::Car, car_id))
    }

    pub async fn fetch_assigned_athletes(&self, car_id: i64) -> LedgerResult<Vec<Athlete>> {
        let mut athletes: Vec<Athlete> = sqlx::query_as(
            "select a.id, a.name, a.contact from athletes a
                inner join assignments s on a.id = s.athlete_id
                where s.car_id = ?
                order by s.id",
        )
        .bind(car_id)
        .fetch_all(&self.db)
        .await?;

        self.load_teams(&mut athletes).await?;
        Ok(athletes)
    }

    pub async fn fetch_assignments_for_car(&self, car_id: i64) -> LedgerResult<Vec<Assignment>> {
        Ok(sqlx::query_as("select * from assignments where car_id = ? order by id")
            .bind(car_id)
            .fetch_all(&self.db)
            .await?)
    }

    pub async fn fetch_assignments_for_match(
        &self,
        match_id: i64,
    ) -> LedgerResult<Vec<Assignment>> {
        Ok(sqlx::query_as("select * from assignments where match_id = ? order by id")
            .bind(match_id)
            .fetch_all(&self.db)
            .await?)
    }

    /// Every car of the match with the athletes riding in it.
    pub async fn fetch_carpool(&self, match_id: i64) -> LedgerResult<Vec<CarPassengers>> {
        let mut carpool = vec![];
        for car in self.fetch_cars_for_match(match_id).await? {
            let passengers = self.fetch_assigned_athletes(car.id).await?;
            carpool.push(CarPassengers { car, passengers });
        }
        Ok(carpool)
    }
}
