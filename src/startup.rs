use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use secrecy::Secret;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings};
use crate::delivery::{CampaignDispatcher, SchedulerSweep};
use crate::email_client::{EmailClient, EmailProvider};
use crate::routes::{
    add_subscriber, create_campaign, create_list, get_campaign, health_check, send_campaign,
    send_scheduled_campaigns, track_open, unsubscribe,
};
use crate::store::{CampaignStore, PgCampaignStore};

pub struct CronSecret(pub Secret<String>);

pub struct ScheduleLeadTime(pub chrono::Duration);

pub struct Application {
    port: u16,
    server: Server,
    sweep: Arc<SchedulerSweep>,
    sweep_interval: Option<Duration>,
}

impl Application {
    /// Builds the application on top of Postgres, applying pending migrations first.
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let db_pool = get_connection_db_pool(&config.database);

        sqlx::migrate!("./migrations").run(&db_pool).await?;

        Self::build_with_store(config, Arc::new(PgCampaignStore::new(db_pool))).await
    }

    pub async fn build_with_store(
        config: Settings,
        store: Arc<dyn CampaignStore>,
    ) -> Result<Self, anyhow::Error> {
        let sender_email = config
            .email_client
            .get_sender_email()
            .map_err(anyhow::Error::msg)?;
        let email_client = EmailClient::new(
            config.email_client.base_url.clone(),
            sender_email,
            config.email_client.api_key.clone(),
            Some(config.email_client.get_timeout()),
        )?;
        let email_provider: Arc<dyn EmailProvider> = Arc::new(email_client);
        let dispatcher = Arc::new(CampaignDispatcher::new(
            store.clone(),
            email_provider,
            config.delivery.get_batcher(),
            config.application.base_url.clone(),
        ));
        let sweep = Arc::new(SchedulerSweep::new(store.clone(), dispatcher.clone()));

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(
            listener,
            store,
            dispatcher,
            sweep.clone(),
            config.scheduler.cron_secret.clone(),
            config.delivery.get_schedule_lead_time(),
        )?;

        Ok(Self {
            port,
            server,
            sweep,
            sweep_interval: config.scheduler.get_sweep_interval(),
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Serves HTTP and, when an interval is configured, sweeps due campaigns in
    /// the background. Returns when either of them stops.
    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        match self.sweep_interval {
            Some(period) => {
                tracing::info!("Sweeping scheduled campaigns every {:?}", period);
                tokio::select! {
                    outcome = self.server => outcome,
                    outcome = self.sweep.run_every(period) => outcome,
                }
            }
            None => self.server.await,
        }
    }
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<CampaignDispatcher>,
    sweep: Arc<SchedulerSweep>,
    cron_secret: Secret<String>,
    schedule_lead_time: chrono::Duration,
) -> Result<Server, std::io::Error> {
    let store: web::Data<dyn CampaignStore> = web::Data::from(store);
    let dispatcher = web::Data::from(dispatcher);
    let sweep = web::Data::from(sweep);
    let cron_secret = web::Data::new(CronSecret(cron_secret));
    let schedule_lead_time = web::Data::new(ScheduleLeadTime(schedule_lead_time));

    let server = HttpServer::new(move || {
        // App is where your application logic lives: routing, middlewares, request handler, etc
        App::new()
            // 'wrap' method adds a middleware to the App. This specific middleware provide incoming
            // request logger
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/lists", web::post().to(create_list))
            .route("/lists/{list_id}/subscribers", web::post().to(add_subscriber))
            .route("/campaigns", web::post().to(create_campaign))
            .route("/campaigns/{campaign_id}", web::get().to(get_campaign))
            .route("/campaigns/{campaign_id}/send", web::post().to(send_campaign))
            .service(
                web::resource("/cron/send-scheduled")
                    .route(web::get().to(send_scheduled_campaigns))
                    .route(web::post().to(send_scheduled_campaigns)),
            )
            .route("/track/{token}", web::get().to(track_open))
            .route("/unsubscribe/{subscriber_id}", web::get().to(unsubscribe))
            .app_data(store.clone())
            .app_data(dispatcher.clone())
            .app_data(sweep.clone())
            .app_data(cron_secret.clone())
            .app_data(schedule_lead_time.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
