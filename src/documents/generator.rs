//! Renders the fixed Russian-language legal texts.
//!
//! Rendering is a pure function of the form and the publication date: the
//! same inputs always produce the same text. Optional values that were not
//! supplied are printed as a fixed placeholder rather than omitted, except for
//! the OGRN in opening paragraphs, which is only mentioned when present.

use chrono::{NaiveDate, Utc};

use super::forms::{
    CompanyDetails, ConsentForm, CookieForm, DocumentForm, OfferForm, PrivacyForm, ReturnForm,
    TermsForm,
};

/// Placeholder for missing masculine-gender values (телефон, адрес, ОГРН…).
pub const NOT_SPECIFIED: &str = "Не указан";
/// Placeholder for missing neuter-gender values (описание…).
pub const NOT_SPECIFIED_NEUTER: &str = "Не указано";

pub const DEFAULT_RETURN_PERIOD_DAYS: u32 = 14;

const DEFAULT_PROCESSING_PURPOSES: &str = "обработка обращений и заявок, заключение и исполнение договоров, информирование об услугах Оператора";
const DEFAULT_THIRD_PARTIES: &str = "не осуществляется, за исключением случаев, предусмотренных законодательством Российской Федерации";
const DEFAULT_PAYMENT_TERMS: &str = "100% предоплата безналичным способом";

pub fn generate(form: &DocumentForm, date: NaiveDate) -> String {
    let date = date.format("%d.%m.%Y").to_string();
    match form {
        DocumentForm::Privacy(form) => privacy_policy(form, &date),
        DocumentForm::Terms(form) => terms_of_service(form, &date),
        DocumentForm::Consent(form) => consent_form(form, &date),
        DocumentForm::Offer(form) => public_offer(form, &date),
        DocumentForm::Cookie(form) => cookie_policy(form, &date),
        DocumentForm::Return(form) => return_policy(form, &date),
    }
}

pub fn generate_today(form: &DocumentForm) -> String {
    generate(form, Utc::now().date_naive())
}

fn or_placeholder<'a>(value: &'a Option<String>, placeholder: &'a str) -> &'a str {
    value.as_deref().unwrap_or(placeholder)
}

/// "ООО Ромашка (ИНН 1234567890, ОГРН 1027700132195)"
fn party(company: &CompanyDetails) -> String {
    match company.ogrn.as_deref() {
        Some(ogrn) => format!(
            "{} (ИНН {}, ОГРН {})",
            company.company_name, company.inn, ogrn
        ),
        None => format!("{} (ИНН {})", company.company_name, company.inn),
    }
}

fn website(company: &CompanyDetails) -> &str {
    or_placeholder(&company.website_url, NOT_SPECIFIED)
}

fn requisites(company: &CompanyDetails) -> String {
    [
        "Реквизиты и контактные данные".to_string(),
        format!("Наименование: {}", company.company_name),
        format!("ИНН: {}", company.inn),
        format!("ОГРН: {}", or_placeholder(&company.ogrn, NOT_SPECIFIED)),
        format!(
            "Адрес: {}",
            or_placeholder(&company.legal_address, NOT_SPECIFIED)
        ),
        format!("Электронная почта: {}", company.contact_email),
        format!("Телефон: {}", or_placeholder(&company.phone, NOT_SPECIFIED)),
        format!("Сайт: {}", website(company)),
    ]
    .join("\n")
}

fn assemble(sections: Vec<String>) -> String {
    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}

fn privacy_policy(form: &PrivacyForm, date: &str) -> String {
    let company = &form.company;
    let site = website(company);
    let email = &company.contact_email;

    assemble(vec![
        "ПОЛИТИКА КОНФИДЕНЦИАЛЬНОСТИ\nв отношении обработки персональных данных".to_string(),
        format!("Дата публикации: {date}"),
        format!(
            "1. Общие положения\n\
             1.1. Настоящая Политика конфиденциальности (далее — Политика) разработана в соответствии с Федеральным законом от 27.07.2006 № 152-ФЗ «О персональных данных» и определяет порядок обработки персональных данных и меры по обеспечению их безопасности, принимаемые {} (далее — Оператор).\n\
             1.2. Политика применяется ко всей информации, которую Оператор может получить о посетителях сайта {site} (далее — Сайт).",
            party(company)
        ),
        "2. Обрабатываемые персональные данные\n\
         2.1. Фамилия, имя, отчество.\n\
         2.2. Адрес электронной почты.\n\
         2.3. Номер телефона.\n\
         2.4. Сведения, собираемые автоматически: IP-адрес, данные файлов cookie, сведения о браузере и устройстве."
            .to_string(),
        "3. Цели обработки персональных данных\n\
         3.1. Идентификация пользователя и предоставление доступа к сервисам Сайта.\n\
         3.2. Направление уведомлений, ответов на запросы и обращения.\n\
         3.3. Улучшение качества работы Сайта."
            .to_string(),
        format!(
            "4. Порядок обработки персональных данных\n\
             4.1. Оператор обрабатывает персональные данные при наличии согласия пользователя, выраженного путём заполнения форм на Сайте.\n\
             4.2. Оператор обеспечивает сохранность персональных данных и не передаёт их третьим лицам, за исключением случаев, предусмотренных законодательством Российской Федерации.\n\
             4.3. Регистратор доменного имени Сайта: {}.\n\
             4.4. Хостинг-провайдер, на серверах которого размещён Сайт: {}.\n\
             4.5. Срок обработки персональных данных ограничен достижением целей обработки или отзывом согласия.",
            or_placeholder(&form.registrar, NOT_SPECIFIED),
            or_placeholder(&form.hosting_provider, NOT_SPECIFIED)
        ),
        format!(
            "5. Права субъекта персональных данных\n\
             5.1. Пользователь вправе получить сведения об обработке своих персональных данных, потребовать их уточнения, блокирования или уничтожения, направив запрос на адрес {email}.\n\
             5.2. Пользователь может отозвать согласие на обработку персональных данных, направив уведомление на адрес {email}."
        ),
        format!(
            "6. Заключительные положения\n\
             6.1. Оператор вправе вносить изменения в Политику. Актуальная редакция размещается на Сайте {site}."
        ),
        requisites(company),
    ])
}

fn terms_of_service(form: &TermsForm, date: &str) -> String {
    let company = &form.company;
    let site = website(company);

    assemble(vec![
        "ПОЛЬЗОВАТЕЛЬСКОЕ СОГЛАШЕНИЕ".to_string(),
        format!("Дата публикации: {date}"),
        format!(
            "1. Общие положения\n\
             1.1. Настоящее Пользовательское соглашение (далее — Соглашение) регулирует отношения между {} (далее — Администрация) и пользователем сайта {site} (далее — Сайт).\n\
             1.2. Использование Сайта означает согласие пользователя с Соглашением. В случае несогласия пользователь обязан прекратить использование Сайта.",
            party(company)
        ),
        "2. Предмет соглашения\n\
         2.1. Администрация предоставляет пользователю доступ к материалам и сервисам Сайта.\n\
         2.2. Материалы Сайта являются объектами исключительных прав Администрации или иных правообладателей. Их копирование без письменного согласия правообладателя запрещено."
            .to_string(),
        "3. Права и обязанности сторон\n\
         3.1. Пользователь обязуется не нарушать работоспособность Сайта и не размещать материалы, нарушающие законодательство Российской Федерации.\n\
         3.2. Администрация вправе изменять Соглашение и ограничивать доступ пользователя к Сайту при нарушении условий Соглашения."
            .to_string(),
        "4. Ответственность\n\
         4.1. Сайт предоставляется «как есть». Администрация не несёт ответственности за временные сбои и перерывы в работе Сайта и за их последствия."
            .to_string(),
        format!(
            "5. Разрешение споров\n\
             5.1. Споры разрешаются путём переговоров. Срок ответа на претензию составляет 30 календарных дней.\n\
             5.2. При недостижении согласия спор передаётся на рассмотрение суда по месту нахождения Администрации. Город: {}.\n\
             5.3. К Соглашению применяется право Российской Федерации.",
            or_placeholder(&form.jurisdiction_city, NOT_SPECIFIED)
        ),
        format!(
            "6. Обратная связь\n\
             6.1. Вопросы по Соглашению направляются на адрес {}.",
            company.contact_email
        ),
        requisites(company),
    ])
}

fn consent_form(form: &ConsentForm, date: &str) -> String {
    let company = &form.company;

    assemble(vec![
        "СОГЛАСИЕ НА ОБРАБОТКУ ПЕРСОНАЛЬНЫХ ДАННЫХ".to_string(),
        format!("Дата: {date}"),
        format!(
            "Я, субъект персональных данных, свободно, своей волей и в своём интересе даю согласие {}, адрес: {} (далее — Оператор), на обработку моих персональных данных, предоставленных через сайт {}, в соответствии с Федеральным законом от 27.07.2006 № 152-ФЗ «О персональных данных».",
            party(company),
            or_placeholder(&company.legal_address, NOT_SPECIFIED),
            website(company)
        ),
        "1. Перечень персональных данных: фамилия, имя, отчество; адрес электронной почты; номер телефона; иные данные, указанные в формах сайта."
            .to_string(),
        format!(
            "2. Цели обработки: {}.",
            form.processing_purposes
                .as_deref()
                .unwrap_or(DEFAULT_PROCESSING_PURPOSES)
        ),
        "3. Перечень действий: сбор, запись, систематизация, накопление, хранение, уточнение (обновление, изменение), извлечение, использование, обезличивание, блокирование, удаление, уничтожение."
            .to_string(),
        format!(
            "4. Передача персональных данных третьим лицам: {}.",
            form.third_parties.as_deref().unwrap_or(DEFAULT_THIRD_PARTIES)
        ),
        format!(
            "5. Согласие действует до достижения целей обработки или до его отзыва. Отзыв направляется на адрес {} или по телефону {}.",
            company.contact_email,
            or_placeholder(&company.phone, NOT_SPECIFIED)
        ),
        requisites(company),
    ])
}

fn public_offer(form: &OfferForm, date: &str) -> String {
    let company = &form.company;

    assemble(vec![
        "ДОГОВОР ПУБЛИЧНОЙ ОФЕРТЫ".to_string(),
        format!("Дата публикации: {date}"),
        format!(
            "1. Общие положения\n\
             1.1. Настоящий документ является официальным предложением (публичной офертой) {} (далее — Продавец) заключить договор на изложенных ниже условиях в соответствии со статьёй 437 Гражданского кодекса Российской Федерации.\n\
             1.2. Акцептом оферты является оформление и оплата заказа на сайте {} либо иным способом, предусмотренным Продавцом.",
            party(company),
            website(company)
        ),
        format!(
            "2. Предмет договора\n\
             2.1. Продавец обязуется передать покупателю товары (оказать услуги), а покупатель обязуется принять и оплатить их.\n\
             2.2. Описание товаров (услуг): {}.",
            or_placeholder(&form.subject, NOT_SPECIFIED_NEUTER)
        ),
        format!(
            "3. Цена и порядок оплаты\n\
             3.1. Цены указываются в рублях Российской Федерации.\n\
             3.2. Порядок оплаты: {}.",
            form.payment_terms.as_deref().unwrap_or(DEFAULT_PAYMENT_TERMS)
        ),
        "4. Права и обязанности сторон\n\
         4.1. Продавец обязуется передать товар (оказать услугу) надлежащего качества в согласованный срок.\n\
         4.2. Покупатель обязуется предоставить достоверные данные для оформления заказа и своевременно оплатить заказ."
            .to_string(),
        "5. Возврат и обмен\n\
         5.1. Возврат и обмен осуществляются в соответствии с Законом РФ от 07.02.1992 № 2300-1 «О защите прав потребителей»."
            .to_string(),
        format!(
            "6. Срок действия оферты\n\
             6.1. Оферта действует до её отзыва Продавцом. Претензии принимаются на адрес {}.",
            company.contact_email
        ),
        requisites(company),
    ])
}

fn cookie_policy(form: &CookieForm, date: &str) -> String {
    let company = &form.company;
    let site = website(company);

    assemble(vec![
        "ПОЛИТИКА ИСПОЛЬЗОВАНИЯ ФАЙЛОВ COOKIE".to_string(),
        format!("Дата публикации: {date}"),
        format!(
            "1. Сайт {site} (далее — Сайт), владельцем которого является {}, использует файлы cookie для обеспечения работы Сайта и улучшения его качества.",
            party(company)
        ),
        "2. Файлы cookie — небольшие текстовые файлы, которые сохраняются в браузере пользователя при посещении Сайта."
            .to_string(),
        "3. Виды используемых файлов cookie\n\
         3.1. Обязательные — необходимы для корректной работы Сайта.\n\
         3.2. Функциональные — запоминают настройки пользователя.\n\
         3.3. Аналитические — позволяют оценивать посещаемость Сайта."
            .to_string(),
        format!(
            "4. Сервис веб-аналитики: {}.",
            or_placeholder(&form.analytics_services, NOT_SPECIFIED)
        ),
        "5. Пользователь может отключить сохранение файлов cookie в настройках браузера. Отключение может повлиять на работу отдельных функций Сайта."
            .to_string(),
        format!(
            "6. Продолжая использование Сайта, пользователь соглашается с использованием файлов cookie. Вопросы направляются на адрес {}.",
            company.contact_email
        ),
        requisites(company),
    ])
}

fn return_policy(form: &ReturnForm, date: &str) -> String {
    let company = &form.company;
    let days = form.return_period_days.unwrap_or(DEFAULT_RETURN_PERIOD_DAYS);

    assemble(vec![
        "ПОЛИТИКА ВОЗВРАТА ТОВАРОВ И ДЕНЕЖНЫХ СРЕДСТВ".to_string(),
        format!("Дата публикации: {date}"),
        format!(
            "1. Настоящая политика определяет порядок возврата товаров, приобретённых у {} (далее — Продавец), в том числе через сайт {}, в соответствии с Законом РФ от 07.02.1992 № 2300-1 «О защите прав потребителей».",
            party(company),
            website(company)
        ),
        format!(
            "2. Покупатель вправе отказаться от товара надлежащего качества в течение {days} {} после его передачи при условии сохранения товарного вида и потребительских свойств.",
            days_word(days)
        ),
        "3. При обнаружении недостатков товара покупатель вправе потребовать замены товара, соразмерного уменьшения цены либо возврата уплаченной суммы."
            .to_string(),
        "4. Денежные средства возвращаются не позднее 10 дней с даты предъявления требования тем же способом, которым была произведена оплата."
            .to_string(),
        format!(
            "5. Для оформления возврата необходимо направить заявление на адрес {} или обратиться по телефону {}. Адрес для возврата товара: {}.",
            company.contact_email,
            or_placeholder(&company.phone, NOT_SPECIFIED),
            or_placeholder(&company.legal_address, NOT_SPECIFIED)
        ),
        requisites(company),
    ])
}

/// Russian plural form of "день" for `n`.
fn days_word(n: u32) -> &'static str {
    let last_two = n % 100;
    let last = n % 10;
    if (11..=14).contains(&last_two) {
        "дней"
    } else if last == 1 {
        "дня"
    } else {
        "дней"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::forms::FormFields;
    use crate::documents::DocumentKind;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date")
    }

    fn fields() -> FormFields {
        FormFields {
            company_name: Some("ООО Ромашка".into()),
            inn: Some("1234567890".into()),
            contact_email: Some("info@romashka.ru".into()),
            website_url: Some("https://romashka.ru".into()),
            ..FormFields::default()
        }
    }

    fn form(kind: DocumentKind) -> DocumentForm {
        fields().validate(kind).expect("valid form")
    }

    #[test]
    fn every_kind_mentions_company_inn_and_email() {
        for kind in DocumentKind::ALL {
            let text = generate(&form(kind), date());
            assert!(!text.trim().is_empty(), "{kind} is empty");
            assert!(text.contains("ООО Ромашка"), "{kind} lacks company");
            assert!(text.contains("1234567890"), "{kind} lacks inn");
            assert!(text.contains("info@romashka.ru"), "{kind} lacks email");
            assert!(text.contains("05.03.2024"), "{kind} lacks date");
        }
    }

    #[test]
    fn missing_optionals_become_placeholders() {
        let text = generate(&form(DocumentKind::Privacy), date());
        assert!(text.contains("ОГРН: Не указан"));
        assert!(text.contains("Телефон: Не указан"));
        assert!(text.contains("Регистратор доменного имени Сайта: Не указан."));
        assert!(text.contains("Хостинг-провайдер, на серверах которого размещён Сайт: Не указан."));

        let offer = generate(&form(DocumentKind::Offer), date());
        assert!(offer.contains("Описание товаров (услуг): Не указано."));
    }

    #[test]
    fn ogrn_is_mentioned_in_opening_only_when_present() {
        let without = generate(&form(DocumentKind::Terms), date());
        assert!(without.contains("ООО Ромашка (ИНН 1234567890)"));

        let with = FormFields {
            ogrn: Some("1027700132195".into()),
            ..fields()
        }
        .validate(DocumentKind::Terms)
        .expect("valid form");
        let text = generate(&with, date());
        assert!(text.contains("ООО Ромашка (ИНН 1234567890, ОГРН 1027700132195)"));
        assert!(text.contains("ОГРН: 1027700132195"));
    }

    #[test]
    fn output_is_deterministic_for_a_fixed_date() {
        for kind in DocumentKind::ALL {
            let form = form(kind);
            assert_eq!(generate(&form, date()), generate(&form, date()));
        }
    }

    #[test]
    fn only_the_date_changes_between_days() {
        let form = form(DocumentKind::Cookie);
        let other = NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date");
        let a = generate(&form, date());
        let b = generate(&form, other);
        assert_ne!(a, b);
        assert_eq!(a.replace("05.03.2024", "01.01.2025"), b);
    }

    #[test]
    fn kind_specific_values_are_substituted() {
        let privacy = FormFields {
            registrar: Some("RU-CENTER".into()),
            hosting_provider: Some("Timeweb".into()),
            ..fields()
        }
        .validate(DocumentKind::Privacy)
        .expect("valid form");
        let text = generate(&privacy, date());
        assert!(text.contains("RU-CENTER"));
        assert!(text.contains("Timeweb"));

        let returns = FormFields {
            return_period_days: Some(21),
            ..fields()
        }
        .validate(DocumentKind::Return)
        .expect("valid form");
        assert!(generate(&returns, date()).contains("в течение 21 дня"));
    }

    #[test]
    fn default_return_period_is_fourteen_days() {
        let text = generate(&form(DocumentKind::Return), date());
        assert!(text.contains("в течение 14 дней"));
    }

    #[test]
    fn day_word_agrees_with_number() {
        assert_eq!(days_word(1), "дня");
        assert_eq!(days_word(7), "дней");
        assert_eq!(days_word(11), "дней");
        assert_eq!(days_word(14), "дней");
        assert_eq!(days_word(21), "дня");
        assert_eq!(days_word(30), "дней");
    }
}
