//! The endpoint table.

use crate::accounts::Accounts;
use crate::calendars::Calendars;
use crate::events::Events;
use crate::records::Records;
use crate::service::CalendarService;
use crate::settings::Settings;
use calworker_bridge::{BridgeResult, HandlerResult, StreamHandle};
use calworker_protocol::endpoints::*;
use calworker_protocol::{Account, Args, Calendar, CalendarEvent, EventRecord, Setting, Value};
use calworker_sync::SyncOrchestrator;

pub(crate) fn register(service: &CalendarService) -> BridgeResult<()> {
    service.method(ECHO, (), echo)?;

    let accounts = service.accounts().clone();
    service.method(ACCOUNTS, accounts.clone(), all_accounts)?;
    service.method(ACCOUNTS_GET, accounts.clone(), get_account)?;
    service.method(ACCOUNTS_CREATE, accounts.clone(), create_account)?;
    service.method(ACCOUNTS_REMOVE, accounts.clone(), remove_account)?;
    service.method(ACCOUNTS_PRESETS, accounts.clone(), available_presets)?;
    service.stream(ACCOUNTS_OBSERVE, accounts, observe_accounts)?;

    let events = service.events().clone();
    service.method(EVENTS_CREATE, events.clone(), create_event)?;
    service.method(EVENTS_UPDATE, events.clone(), update_event)?;
    service.method(EVENTS_REMOVE, events, remove_event)?;

    service.method(RECORDS_GET, service.records().clone(), fetch_record)?;

    let settings = service.settings().clone();
    service.method(SETTINGS_GET, settings.clone(), get_setting)?;
    service.method(SETTINGS_SET, settings.clone(), set_setting)?;
    service.stream(SETTINGS_OBSERVE, settings, observe_setting)?;

    let calendars = service.calendars().clone();
    service.method(CALENDARS_UPDATE, calendars.clone(), update_calendar)?;
    service.stream(CALENDARS_OBSERVE, calendars, observe_calendars)?;

    service.method(SYNC_ALL, service.sync().clone(), sync_all)?;
    Ok(())
}

async fn echo(_: (), args: Args) -> HandlerResult<Value> {
    Ok(args.to_value())
}

async fn all_accounts(accounts: Accounts, _: Args) -> HandlerResult<Vec<Account>> {
    Ok(accounts.all()?)
}

async fn get_account(accounts: Accounts, args: Args) -> HandlerResult<Option<Account>> {
    let id: String = args.get(0)?;
    Ok(accounts.get(&id)?)
}

async fn create_account(accounts: Accounts, args: Args) -> HandlerResult<Account> {
    Ok(accounts.persist(args.get(0)?).await?)
}

async fn remove_account(accounts: Accounts, args: Args) -> HandlerResult<bool> {
    let id: String = args.get(0)?;
    Ok(accounts.remove(&id)?)
}

async fn available_presets(accounts: Accounts, args: Args) -> HandlerResult<Vec<String>> {
    Ok(accounts.available_presets(args.get(0)?)?)
}

async fn observe_accounts(accounts: Accounts, stream: StreamHandle, _: Args) -> HandlerResult<()> {
    accounts.observe(&stream);
    Ok(())
}

async fn create_event(events: Events, args: Args) -> HandlerResult<CalendarEvent> {
    Ok(events.create(args.get(0)?)?)
}

async fn update_event(events: Events, args: Args) -> HandlerResult<CalendarEvent> {
    Ok(events.update(args.get(0)?)?)
}

async fn remove_event(events: Events, args: Args) -> HandlerResult<bool> {
    let event: CalendarEvent = args.get(0)?;
    Ok(events.remove(&event)?)
}

async fn fetch_record(records: Records, args: Args) -> HandlerResult<EventRecord> {
    let event_id: String = args.get(0)?;
    Ok(records.fetch(&event_id)?)
}

async fn get_setting(settings: Settings, args: Args) -> HandlerResult<Option<Value>> {
    let id: String = args.get(0)?;
    Ok(settings.get(&id)?)
}

async fn set_setting(settings: Settings, args: Args) -> HandlerResult<Setting> {
    let id: String = args.get(0)?;
    let value = args.optional(1)?.unwrap_or(Value::Null);
    Ok(settings.set(&id, value)?)
}

async fn observe_setting(settings: Settings, stream: StreamHandle, args: Args) -> HandlerResult<()> {
    let id: String = args.get(0)?;
    settings.observe(&id, &stream);
    Ok(())
}

async fn update_calendar(calendars: Calendars, args: Args) -> HandlerResult<Calendar> {
    Ok(calendars.update(args.get(0)?)?)
}

async fn observe_calendars(calendars: Calendars, stream: StreamHandle, _: Args) -> HandlerResult<()> {
    calendars.observe(&stream);
    Ok(())
}

// Returns as soon as the sync is under way; progress is reported through
// the sync lifecycle broadcasts.
async fn sync_all(sync: SyncOrchestrator, _: Args) -> HandlerResult<()> {
    tokio::spawn(async move { sync.sync_all().await });
    Ok(())
}
